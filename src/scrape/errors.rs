//! Error types for the scraping seam.

/// Failure while driving a target site.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("navigation failed on {target}: {reason}")]
    Navigation { target: &'static str, reason: String },
    #[error("{target} page {page} row {row}: {reason}")]
    Parse {
        target: &'static str,
        page: u32,
        row: usize,
        reason: String,
    },
    #[error("{target} page {page} has an unexpected layout: {reason}")]
    Layout {
        target: &'static str,
        page: u32,
        reason: String,
    },
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error("malformed JSON response")]
    Json(#[source] anyhow::Error),
}

impl ScrapeError {
    pub fn navigation(target: &'static str, reason: impl Into<String>) -> Self {
        Self::Navigation {
            target,
            reason: reason.into(),
        }
    }

    pub fn layout(target: &'static str, page: u32, reason: impl Into<String>) -> Self {
        Self::Layout {
            target,
            page,
            reason: reason.into(),
        }
    }
}

/// A single list-page row that did not have the expected structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct RowError {
    pub reason: String,
}

impl RowError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
