pub mod config;
pub mod error;
pub mod gateway;
pub mod install;
pub mod logging;
pub mod providers;
pub mod search;
pub mod selftest;

use anyhow::{Context, Result};
use reqwest::Client;
use std::env;
use std::io;
use std::process::ExitCode;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use config::Config;
use error::SearchError;
use gateway::HostSearchGateway;
use install::InstallPlan;

fn bootstrap() -> (Config, Option<WorkerGuard>) {
    dotenvy::dotenv().ok();
    let log_guard = logging::init();

    let cfg = Config::from_env();
    info!(
        model = %cfg.model,
        base_url = %cfg.base_url,
        api_key_present = cfg.api_key.is_some(),
        timeout_secs = ?cfg.timeout_secs,
        "loaded runtime configuration"
    );
    (cfg, log_guard)
}

fn http_client() -> Result<Client> {
    Client::builder()
        .build()
        .context("Failed to initialize HTTP client")
}

fn query_from_args() -> String {
    env::args().skip(1).collect::<Vec<_>>().join(" ")
}

/// Entry point of `grok-search`: one query from the joined arguments.
pub async fn run() -> ExitCode {
    let (cfg, _log_guard) = bootstrap();

    let query = query_from_args();
    if query.is_empty() {
        eprintln!("{}", SearchError::Usage);
        return ExitCode::FAILURE;
    }

    let client = match http_client() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    let gateway = HostSearchGateway::new(&client, &cfg);

    let (mut stdout, mut stderr) = (io::stdout().lock(), io::stderr());
    match search::perform_web_search(&gateway, &cfg, &query, &mut stdout, &mut stderr).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(SearchError::Request { .. }) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Entry point of `grok-selftest`: the fixed live suite, or a single query
/// when arguments are given.
pub async fn run_selftest() -> ExitCode {
    let (cfg, _log_guard) = bootstrap();

    if let Err(err) = cfg.api_key() {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }

    let client = match http_client() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    let gateway = HostSearchGateway::new(&client, &cfg);
    let mut stdout = io::stdout().lock();

    let query = query_from_args();
    if !query.is_empty() {
        return match selftest::run_single_query(&gateway, &cfg, &query, &mut stdout).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("\nError: {err:#}");
                ExitCode::FAILURE
            }
        };
    }

    match selftest::run_suite(
        &gateway,
        &cfg,
        &selftest::DEFAULT_CASES,
        selftest::CASE_DELAY,
        &mut stdout,
    )
    .await
    {
        Ok(report) if report.failed() == 0 => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("\nTest suite failed with error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Entry point of `grok-install`.
pub fn run_install() -> ExitCode {
    let (cfg, _log_guard) = bootstrap();

    let result = InstallPlan::for_current_user().and_then(|plan| {
        install::install(&plan, cfg.api_key.is_some(), &mut io::stdout().lock())
    });
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("\nInstallation failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}
