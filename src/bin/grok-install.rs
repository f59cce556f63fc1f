use std::process::ExitCode;

fn main() -> ExitCode {
    grok_search::run_install()
}
