//! Shared fixtures for the integration tests: a scripted portal that stands
//! in for the live HTTP transport.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use licscrape::record::RawRecord;
use licscrape::scrape::{Engine, RunSummary, ScrapeError, ScrapeOptions, Target};
use licscrape::store::ScrapeStore;
use licscrape::transport::{Page, Request, Transport};

type Responder = Box<dyn Fn(&Request) -> Option<String> + Send + Sync>;

/// Transport answering each request from a closure and recording what was
/// asked. A `None` answer is served as an HTTP 500.
pub struct MockSite {
    responder: Responder,
    log: Mutex<Vec<Request>>,
}

impl MockSite {
    pub fn new(responder: impl Fn(&Request) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }

    /// Number of recorded requests matching `pred`.
    pub fn count(&self, pred: impl Fn(&Request) -> bool) -> usize {
        self.log.lock().unwrap().iter().filter(|r| pred(r)).count()
    }
}

#[async_trait]
impl Transport for MockSite {
    async fn fetch(&self, request: Request) -> Result<Page, ScrapeError> {
        self.log.lock().unwrap().push(request.clone());
        match (self.responder)(&request) {
            Some(body) => Ok(Page {
                url: request.url,
                body,
            }),
            None => Err(ScrapeError::Status {
                url: request.url.to_string(),
                status: 500,
            }),
        }
    }
}

/// Scratch directory holding one target's cache.
pub struct Scratch {
    dir: tempfile::TempDir,
}

impl Scratch {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn cache(&self) -> PathBuf {
        self.dir.path().join("cache.json")
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn store_for(&self, target: &dyn Target) -> ScrapeStore {
        ScrapeStore::load(self.cache(), |r| target.identity_key(r)).unwrap()
    }

    pub fn cache_text(&self) -> String {
        std::fs::read_to_string(self.cache()).unwrap()
    }

    pub fn cached_records(&self) -> Vec<RawRecord> {
        serde_json::from_str(&self.cache_text()).unwrap()
    }
}

/// Run `target` once against `site` with a fresh store over the scratch cache.
pub async fn run_once(
    target: &mut dyn Target,
    site: &MockSite,
    scratch: &Scratch,
    options: ScrapeOptions,
) -> anyhow::Result<RunSummary> {
    let mut store = scratch.store_for(target);
    Engine::new(target, site, options).run(&mut store).await
}
