//! Scrapers for U.S. state professional-licensing portals.
//!
//! Each [`targets`] module knows one portal; [`scrape::Engine`] drives any of
//! them through the same fetch, dedup, detail and persist loop, and
//! [`export`] turns the resulting cache into a CSV with a common schema.

pub mod app;
pub mod cli;
pub mod config;
pub mod export;
pub mod forms;
pub mod html;
pub mod json;
pub mod logging;
pub mod names;
pub mod record;
pub mod scrape;
pub mod store;
pub mod targets;
pub mod transport;
pub mod utils;
