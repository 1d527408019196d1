//! The generic scrape loop and the capability interface each target implements.

pub mod engine;
pub mod errors;

use async_trait::async_trait;

use crate::record::{IdentityKey, NormalizedRecord, RawRecord};
use crate::transport::{Page, Transport};

pub use engine::{Engine, RunSummary, ScrapeOptions};
pub use errors::{RowError, ScrapeError};

/// What to do with a list row that does not have the expected structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RowPolicy {
    /// Log the row, count it and continue with the next one.
    Skip,
    /// Stop the run with a parse error naming the row.
    Fail,
}

/// What to do when fetching or parsing a detail page fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DetailPolicy {
    /// Store the record with the fields from its list row only.
    KeepPartial,
    /// Leave the record out; a later run fetches it again.
    Drop,
    /// Stop the run.
    Abort,
}

/// Rows parsed from one list page: the outer error means the page itself is
/// unusable, an inner one that a single row is.
pub type ParsedRows = Vec<Result<RawRecord, RowError>>;

/// Site-specific capabilities driven by [`Engine`].
///
/// Navigation methods take `&mut self` because postback-driven portals carry
/// the form state of the last page they served into the next request.
#[async_trait]
pub trait Target: Send + Sync {
    /// Short name, also used for the default cache and export file names.
    fn name(&self) -> &'static str;

    /// Entry page of the search portal.
    fn portal_url(&self) -> &'static str;

    /// Columns appended to the common export schema.
    fn extra_columns(&self) -> &'static [&'static str] {
        &[]
    }

    /// Highest list page to fetch within one partition.
    fn page_limit(&self) -> u32 {
        u32::MAX
    }

    /// Whether any list page can be requested directly, as opposed to only
    /// the one after the last page served.
    fn seekable(&self) -> bool {
        false
    }

    fn has_detail(&self) -> bool {
        false
    }

    /// Persist the store after this many new records.
    fn persist_interval(&self) -> usize {
        1
    }

    fn row_policy(&self) -> RowPolicy {
        RowPolicy::Skip
    }

    fn detail_policy(&self) -> DetailPolicy {
        DetailPolicy::Abort
    }

    /// Fields the detail page is more authoritative for than the list row.
    /// Never part of the identity key.
    fn detail_overrides(&self) -> &'static [&'static str] {
        &[]
    }

    /// Establish session state, typically by submitting the search form.
    async fn prepare(&mut self, _transport: &dyn Transport) -> Result<(), ScrapeError> {
        Ok(())
    }

    /// Independent searches to run in order. A single unnamed partition
    /// unless the portal can only be searched piecewise.
    async fn partitions(&mut self, _transport: &dyn Transport) -> Result<Vec<String>, ScrapeError> {
        Ok(vec![String::new()])
    }

    /// List page `page` (1-based) of `partition`, or `None` once the portal
    /// offers no further page.
    async fn fetch_list_page(
        &mut self,
        transport: &dyn Transport,
        partition: &str,
        page: u32,
    ) -> Result<Option<Page>, ScrapeError>;

    fn parse_rows(&self, page: &Page, page_number: u32) -> Result<ParsedRows, ScrapeError>;

    fn identity_key(&self, record: &RawRecord) -> IdentityKey;

    /// Fields from the detail page of `record`, merged into it by the engine.
    async fn fetch_detail(
        &mut self,
        _transport: &dyn Transport,
        _record: &RawRecord,
    ) -> Result<RawRecord, ScrapeError> {
        Ok(RawRecord::new())
    }

    fn format_record(&self, record: &RawRecord) -> NormalizedRecord;
}
