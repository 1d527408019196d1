use std::process::ExitCode;

use clap::Parser;
use licscrape::app::App;
use licscrape::cli::Args;
use licscrape::config::Config;
use licscrape::logging::setup_logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Logging depends on the config, so a bad config can only go to stderr.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        data_dir = %config.data_dir.display(),
        "starting licscrape"
    );

    let app = App::new(config);
    match app.run(args.command).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = format!("{e:#}"), "licscrape failed");
            ExitCode::FAILURE
        }
    }
}
