mod config;
mod main_lib;

use std::process::ExitCode;

use config::Config;
use main_lib::{init_tracing, run_batch};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;
    init_tracing(&config.log_format);

    let report = run_batch(&config).await?;
    tracing::info!("{}", report.summary());
    // Entity failures are in the summary; only an incomplete batch fails the run.
    if report.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
