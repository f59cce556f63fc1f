use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    grok_search::run().await
}
