use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::scrape::{DetailPolicy, RowPolicy};
use crate::targets::TargetName;

/// Scrape licensed-professional listings from state licensing boards.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = TracingFormat::Pretty)]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the available targets and their portals
    Targets,
    /// Scrape a target, resuming from its cache
    Scrape(ScrapeArgs),
    /// Write a target's cache out as CSV
    Export(ExportArgs),
}

#[derive(clap::Args, Debug)]
pub struct ScrapeArgs {
    pub target: TargetName,

    /// Cache file [default: <data_dir>/<target>.json]
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Stop each partition after this many list pages
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Ignore the saved page cursor and start from the first page
    #[arg(long)]
    pub restart: bool,

    /// Override the target's handling of failed detail pages
    #[arg(long, value_enum)]
    pub detail_policy: Option<DetailPolicy>,

    /// Override the target's handling of malformed list rows
    #[arg(long, value_enum)]
    pub row_policy: Option<RowPolicy>,

    /// Export the cache to CSV once the scrape finishes
    #[arg(long)]
    pub export: bool,

    /// CSV path for --export [default: <data_dir>/<target>.csv]
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    pub target: TargetName,

    /// Cache file [default: <data_dir>/<target>.json]
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// CSV path [default: <data_dir>/<target>.csv]
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Compact human-readable output
    Pretty,
    /// One JSON object per event
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_flags() {
        let args = Args::parse_from([
            "licscrape",
            "--tracing",
            "json",
            "scrape",
            "new-hampshire",
            "--max-pages",
            "3",
            "--detail-policy",
            "keep-partial",
            "--export",
        ]);
        assert_eq!(args.tracing, TracingFormat::Json);
        let Command::Scrape(scrape) = args.command else {
            panic!("expected scrape");
        };
        assert_eq!(scrape.target, TargetName::NewHampshire);
        assert_eq!(scrape.max_pages, Some(3));
        assert_eq!(scrape.detail_policy, Some(DetailPolicy::KeepPartial));
        assert_eq!(scrape.row_policy, None);
        assert!(scrape.export && !scrape.restart);
    }

    #[test]
    fn unknown_target_is_rejected() {
        assert!(Args::try_parse_from(["licscrape", "scrape", "atlantis"]).is_err());
    }

    #[test]
    fn definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
