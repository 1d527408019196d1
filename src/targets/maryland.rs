//! Maryland Board of Plumbing licensees, searched one zip code at a time.
//!
//! The CGI search caps results per query, so the state is covered by running
//! one search per zip code from a list shipped alongside the scraper, then
//! following the " Next 50 " button within each.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use html_scraper::Html;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::forms::HtmlForm;
use crate::html::{cells, css, table_rows, text};
use crate::names::first_last;
use crate::record::{IdentityKey, NormalizedRecord, RawRecord, status_from_expiration};
use crate::scrape::{ParsedRows, RowError, ScrapeError, Target};
use crate::transport::{Page, Request, Transport};

const NAME: &str = "maryland";
const SEARCH_URL: &str = "https://www.dllr.state.md.us/cgi-bin/ElectronicLicensing/OP_Search/OP_search.cgi?calling_app=PLM::PLM_personal_location";
const KEYS: &[&str] = &[
    "Name",
    "City",
    "State",
    "Zip",
    "Expiration",
    "Category",
    "Insured",
    "License",
];
const NEXT_LABEL: &str = "Next 50";

#[derive(Debug, Deserialize)]
struct ZipRow {
    zip: String,
}

pub struct Maryland {
    zip_codes: Vec<String>,
    /// Zip code being searched.
    zip: String,
    current: Option<Page>,
    today: NaiveDate,
}

impl Maryland {
    pub fn new(zip_codes: Vec<String>) -> Self {
        Self {
            zip_codes,
            zip: String::new(),
            current: None,
            today: Local::now().date_naive(),
        }
    }

    /// Load the zip code list from a CSV file with a `zip` column.
    pub fn from_zip_file(path: &Path) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open zip code list {}", path.display()))?;
        let zip_codes = reader
            .deserialize::<ZipRow>()
            .map(|row| row.map(|r| r.zip.trim().to_string()))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read zip code list {}", path.display()))?;
        debug!(path = %path.display(), zip_codes = zip_codes.len(), "Loaded zip code list");
        Ok(Self::new(zip_codes))
    }
}

fn search_request(page: &Page, zip: &str) -> Result<Request, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let mut form = HtmlForm::containing(&doc, &page.url, &css("input[name=zip]"))
        .ok_or_else(|| ScrapeError::navigation(NAME, "zip search form not found"))?;
    form.set("zip", zip);
    Ok(form.click("Submit").unwrap_or_else(|| form.submit()))
}

/// Request pressing " Next 50 " on `current`, `None` on the last page.
fn next_request(current: &Page) -> Option<Request> {
    let doc = Html::parse_document(&current.body);
    let form = HtmlForm::containing(&doc, &current.url, &css(r#"input[value=" Next 50 "]"#))?;
    let button = form.button_named_by_label(NEXT_LABEL)?;
    form.click(button)
}

fn parse_results(page: &Page, zip: &str) -> ParsedRows {
    let doc = Html::parse_document(&page.body);
    let Some(table) = doc.select(&css("table")).next() else {
        return Vec::new();
    };

    table_rows(table)
        .into_iter()
        .skip(1)
        .map(|row| {
            let columns = cells(row);
            if columns.len() < KEYS.len() {
                return Err(RowError::new(format!(
                    "expected {} cells, found {}",
                    KEYS.len(),
                    columns.len()
                )));
            }
            let mut record = RawRecord::zip(KEYS, columns.iter().map(|c| text(*c)));
            // The listing shows the licensee's own zip; the searched one
            // records which partition found the record.
            record.insert("Zip", zip);
            Ok(record)
        })
        .collect()
}

#[async_trait]
impl Target for Maryland {
    fn name(&self) -> &'static str {
        NAME
    }

    fn portal_url(&self) -> &'static str {
        SEARCH_URL
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &["Full Name", "License Type", "Insured", "Expiration Date"]
    }

    fn persist_interval(&self) -> usize {
        200
    }

    async fn partitions(&mut self, _transport: &dyn Transport) -> Result<Vec<String>, ScrapeError> {
        Ok(self.zip_codes.clone())
    }

    async fn fetch_list_page(
        &mut self,
        transport: &dyn Transport,
        partition: &str,
        page: u32,
    ) -> Result<Option<Page>, ScrapeError> {
        let request = if page == 1 {
            self.zip = partition.to_string();
            let search = transport.fetch(Request::get(Url::parse(SEARCH_URL)?)).await?;
            search_request(&search, partition)?
        } else {
            match self.current.as_ref().and_then(next_request) {
                Some(request) => request,
                None => return Ok(None),
            }
        };
        let served = transport.fetch(request).await?;
        self.current = Some(served.clone());
        Ok(Some(served))
    }

    fn parse_rows(&self, page: &Page, _page_number: u32) -> Result<ParsedRows, ScrapeError> {
        Ok(parse_results(page, &self.zip))
    }

    fn identity_key(&self, record: &RawRecord) -> IdentityKey {
        IdentityKey::from_fields(record, &["License", "Name"])
    }

    fn format_record(&self, record: &RawRecord) -> NormalizedRecord {
        let mut out = NormalizedRecord::new(self.extra_columns());
        let (first, last) = first_last(record.field("Name"));
        let status = status_from_expiration(record.field("Expiration"), self.today);
        out.set("License Status", status.unwrap_or_default());
        out.set("Last Name", last);
        out.set("First Name", first);
        out.set("City", record.field("City"));
        out.set("State", record.field("State"));
        out.set("Zip Code", record.field("Zip"));
        out.set("License Number", record.field("License"));
        out.set("Full Name", record.field("Name"));
        out.set("License Type", record.field("Category"));
        out.set("Insured", record.field("Insured"));
        out.set("Expiration Date", record.field("Expiration"));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Page {
        Page {
            url: Url::parse(SEARCH_URL).unwrap(),
            body: body.to_string(),
        }
    }

    const RESULTS: &str = r#"<form method="post" action="OP_search.cgi">
        <input type="hidden" name="calling_app" value="PLM::PLM_personal_location" />
        <input type="hidden" name="start" value="51" />
        <table>
          <tr><th>Name</th><th>City</th><th>State</th><th>Zip</th><th>Expires</th><th>Category</th><th>Insured</th><th>License</th></tr>
          <tr><td>DOE, JANE</td><td>BALTIMORE</td><td>MD</td><td>21230</td><td>2030-04-30</td><td>Master Plumber</td><td>Y</td><td>20551</td></tr>
          <tr><td>BROKEN</td></tr>
        </table>
        <input type="submit" name="next" value=" Next 50 " />
        </form>"#;

    #[test]
    fn rows_take_the_searched_zip() {
        let rows = parse_results(&page(RESULTS), "21201");
        assert_eq!(rows.len(), 2);
        let record = rows[0].as_ref().unwrap();
        assert_eq!(record.get("Zip"), Some("21201"));
        assert_eq!(record.get("License"), Some("20551"));
        assert!(rows[1].is_err());
    }

    #[test]
    fn no_table_means_no_results() {
        assert!(parse_results(&page("<p>No licensees found.</p>"), "21201").is_empty());
    }

    #[test]
    fn next_button_continues_the_search() {
        let request = next_request(&page(RESULTS)).unwrap();
        assert_eq!(request.param("next"), Some(" Next 50 "));
        assert_eq!(request.param("start"), Some("51"));
        assert!(next_request(&page("<form><input type=submit name=Submit value=Search /></form>")).is_none());
    }

    #[test]
    fn search_fills_zip() {
        let request = search_request(
            &page(r#"<form action="OP_search.cgi"><input name="zip" /><input type="submit" name="Submit" value="Search" /></form>"#),
            "21201",
        )
        .unwrap();
        assert_eq!(request.param("zip"), Some("21201"));
        assert_eq!(request.param("Submit"), Some("Search"));
    }

    #[test]
    fn status_comes_from_expiration() {
        let mut target = Maryland::new(vec!["21201".into()]);
        target.today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let rows = parse_results(&page(RESULTS), "21201");
        let out = target.format_record(rows[0].as_ref().unwrap());
        assert_eq!(out.get("License Status"), Some("Active"));
        assert_eq!(out.get("Last Name"), Some("DOE"));
        assert_eq!(out.get("License Type"), Some("Master Plumber"));

        let expired = RawRecord::zip(&["Name", "Expiration"], ["X Y", "2020-01-01"]);
        assert_eq!(target.format_record(&expired).get("License Status"), Some("Expired"));
        let garbled = RawRecord::zip(&["Name", "Expiration"], ["X Y", "soon"]);
        assert_eq!(target.format_record(&garbled).get("License Status"), Some(""));
    }

    #[test]
    fn zip_file_is_read_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("md_zip.csv");
        std::fs::write(&path, "zip,city\n21201,Baltimore\n20601, Waldorf\n").unwrap();
        let target = Maryland::from_zip_file(&path).unwrap();
        assert_eq!(target.zip_codes, ["21201", "20601"]);
        assert!(Maryland::from_zip_file(&dir.path().join("missing.csv")).is_err());
    }
}
