//! HTTP session shared by a target for one run.
//!
//! Targets describe requests as plain data and hand them to a [`Transport`];
//! the live implementation keeps a cookie jar so search state survives from
//! the search form through pagination and detail pages.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::trace;
use url::Url;

use crate::scrape::ScrapeError;
use crate::utils::log_if_slow;

const SLOW_REQUEST: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One HTTP request as a target wants it sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            query: Vec::new(),
            form: Vec::new(),
        }
    }

    pub fn post(url: Url) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(url)
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn form_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.form.push((key.into(), value.to_string()));
        self
    }

    pub fn with_form(mut self, form: Vec<(String, String)>) -> Self {
        self.form = form;
        self
    }

    /// Value of the first query parameter or form field named `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .chain(&self.form)
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A fetched document and the URL it was finally served from.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: Request) -> Result<Page, ScrapeError>;
}

/// Live transport backed by a cookie-keeping [`reqwest::Client`].
pub struct HttpTransport {
    http: reqwest::Client,
    /// One request per `request_delay`; `None` when the delay is zero.
    pacing: Option<DefaultDirectRateLimiter>,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration, delay: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        let pacing = Quota::with_period(delay).map(RateLimiter::direct);
        Ok(Self { http, pacing })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: Request) -> Result<Page, ScrapeError> {
        if let Some(pacing) = &self.pacing {
            pacing.until_ready().await;
        }

        let url = request.url.to_string();
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.http.request(method, request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if request.method == Method::Post {
            builder = builder.form(&request.form);
        }

        let start = Instant::now();
        let resp = builder.send().await.map_err(|source| ScrapeError::Request {
            url: url.clone(),
            source,
        })?;
        log_if_slow(start, SLOW_REQUEST, &url);

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let final_url = resp.url().clone();
        let body = resp
            .text()
            .await
            .map_err(|source| ScrapeError::Request { url, source })?;
        trace!(url = %final_url, bytes = body.len(), "Fetched page");

        Ok(Page {
            url: final_url,
            body,
        })
    }
}
