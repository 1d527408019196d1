use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use tracing::{info, warn};
use yansi::Paint;

use crate::cli::{Command, ExportArgs, ScrapeArgs};
use crate::config::Config;
use crate::export::export_csv;
use crate::scrape::{Engine, ScrapeOptions, Target};
use crate::store::ScrapeStore;
use crate::targets::TargetName;
use crate::transport::HttpTransport;

/// Exit status after Ctrl-C, as a shell reports SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

/// Main application struct: the loaded configuration and the command
/// dispatch built on it.
pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run one command to completion.
    pub async fn run(&self, command: Command) -> anyhow::Result<ExitCode> {
        match command {
            Command::Targets => {
                self.list_targets();
                Ok(ExitCode::SUCCESS)
            }
            Command::Scrape(args) => self.scrape(args).await,
            Command::Export(args) => {
                self.export(args)?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }

    fn list_targets(&self) {
        for name in TargetName::all() {
            let label = format!("{:<14}", name.name());
            println!("{} {}", label.bold(), name.portal_url().dim());
        }
    }

    fn load_store(
        &self,
        target: &dyn Target,
        cache: Option<PathBuf>,
    ) -> anyhow::Result<ScrapeStore> {
        let path = cache.unwrap_or_else(|| self.config.cache_path(target.name()));
        ScrapeStore::load(path, |record| target.identity_key(record))
    }

    async fn scrape(&self, args: ScrapeArgs) -> anyhow::Result<ExitCode> {
        let mut target = args.target.build(&self.config)?;
        let mut store = self.load_store(target.as_ref(), args.cache)?;
        let transport = HttpTransport::new(
            self.config.user_agent(),
            self.config.request_timeout,
            self.config.request_delay,
        )
        .context("Failed to build HTTP client")?;

        let mut options = ScrapeOptions::for_target(target.as_ref());
        options.max_pages = args.max_pages;
        options.resume = !args.restart;
        if let Some(policy) = args.row_policy {
            options.row_policy = policy;
        }
        if let Some(policy) = args.detail_policy {
            options.detail_policy = policy;
        }

        info!(
            target_name = target.name(),
            cache = %store.path().display(),
            cached = store.len(),
            ?options,
            "Scrape requested"
        );

        let outcome = {
            let mut engine = Engine::new(target.as_mut(), &transport, options);
            tokio::select! {
                result = engine.run(&mut store) => Some(result),
                _ = tokio::signal::ctrl_c() => None,
            }
        };

        match outcome {
            None => {
                warn!(target_name = target.name(), "Interrupted, saving progress");
                store.persist()?;
                Ok(ExitCode::from(EXIT_INTERRUPTED))
            }
            Some(Err(e)) => {
                // Records gathered before the failure are kept for the next run.
                if let Err(persist_err) = store.persist() {
                    warn!(
                        error = format!("{persist_err:#}"),
                        "Failed to save progress after error"
                    );
                }
                Err(e)
            }
            Some(Ok(_summary)) => {
                if args.export {
                    let output = args
                        .output
                        .unwrap_or_else(|| self.config.export_path(target.name()));
                    write_export(target.as_ref(), &store, &output)?;
                }
                Ok(ExitCode::SUCCESS)
            }
        }
    }

    fn export(&self, args: ExportArgs) -> anyhow::Result<()> {
        // Formatting needs no partition inputs.
        let target = args.target.bare();
        let store = self.load_store(target.as_ref(), args.cache)?;
        if store.is_empty() {
            warn!(target_name = target.name(), cache = %store.path().display(), "Cache is empty");
        }
        let output = args.output.unwrap_or_else(|| self.config.export_path(target.name()));
        write_export(target.as_ref(), &store, &output)
    }
}

fn write_export(target: &dyn Target, store: &ScrapeStore, output: &Path) -> anyhow::Result<()> {
    let formatted: Vec<_> = store.records().map(|r| target.format_record(r)).collect();
    export_csv(output, target.extra_columns(), &formatted)?;
    Ok(())
}
