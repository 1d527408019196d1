//! West Virginia Division of Labor plumber licenses.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use html_scraper::Html;
use url::Url;

use crate::html::{css, text};
use crate::names::first_last;
use crate::record::{IdentityKey, NormalizedRecord, RawRecord, status_from_expiration};
use crate::scrape::{ParsedRows, RowError, ScrapeError, Target};
use crate::transport::{Page, Request, Transport};

const NAME: &str = "west-virginia";
const RESULTS_URL: &str = "http://www.wvlabor.com/new_searches/plumber_RESULTS.cfm";
const KEYS: &[&str] = &["PLNumber", "Name", "City", "County", "Classification", "Expires"];

pub struct WestVirginia {
    today: NaiveDate,
}

impl WestVirginia {
    pub fn new() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }
}

impl Default for WestVirginia {
    fn default() -> Self {
        Self::new()
    }
}

fn list_request(page: u32) -> Result<Request, ScrapeError> {
    Ok(Request::get(Url::parse(RESULTS_URL)?)
        .query("PageNum_WVNUMBER", page)
        .query("wvnumber", "")
        .query("contractor_name", "")
        .query("city_name", "")
        .query("County", "")
        .query("Submit3", "Search+Plumbers"))
}

fn parse_results(page: &Page) -> ParsedRows {
    let doc = Html::parse_document(&page.body);
    let td_sel = css("td");
    doc.select(&css("tr"))
        .skip(1)
        .map(|row| {
            let values: Vec<String> = row.select(&td_sel).map(text).collect();
            match values.first() {
                Some(license) if !license.is_empty() => Ok(RawRecord::zip(KEYS, values)),
                _ => Err(RowError::new("row has no license number")),
            }
        })
        .collect()
}

#[async_trait]
impl Target for WestVirginia {
    fn name(&self) -> &'static str {
        NAME
    }

    fn portal_url(&self) -> &'static str {
        RESULTS_URL
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &["Expiration Date", "Classification", "County"]
    }

    fn page_limit(&self) -> u32 {
        263
    }

    fn seekable(&self) -> bool {
        true
    }

    async fn fetch_list_page(
        &mut self,
        transport: &dyn Transport,
        _partition: &str,
        page: u32,
    ) -> Result<Option<Page>, ScrapeError> {
        Ok(Some(transport.fetch(list_request(page)?).await?))
    }

    fn parse_rows(&self, page: &Page, _page_number: u32) -> Result<ParsedRows, ScrapeError> {
        Ok(parse_results(page))
    }

    fn identity_key(&self, record: &RawRecord) -> IdentityKey {
        IdentityKey::from_fields(record, &["PLNumber"])
    }

    fn format_record(&self, record: &RawRecord) -> NormalizedRecord {
        let mut out = NormalizedRecord::new(self.extra_columns());
        let (first, last) = first_last(record.field("Name"));
        let status = status_from_expiration(record.field("Expires"), self.today);
        out.set("Last Name", last);
        out.set("First Name", first);
        out.set("City", record.field("City"));
        out.set("State", "West Virginia");
        out.set("License Status", status.unwrap_or_default());
        out.set("License Number", record.field("PLNumber"));
        out.set("Expiration Date", record.field("Expires"));
        out.set("Classification", record.field("Classification"));
        out.set("County", record.field("County"));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Page {
        Page {
            url: Url::parse(RESULTS_URL).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn list_request_pages_by_number() {
        let request = list_request(12).unwrap();
        assert_eq!(request.param("PageNum_WVNUMBER"), Some("12"));
        assert_eq!(request.param("Submit3"), Some("Search+Plumbers"));
        assert_eq!(request.param("County"), Some(""));
    }

    #[test]
    fn header_row_is_skipped() {
        let rows = parse_results(&page(
            r#"<table>
                <tr><th>License</th><th>Name</th></tr>
                <tr><td>PL01234</td><td>MOTHMAN, JOHN</td><td>POINT PLEASANT</td><td>MASON</td><td>Master</td><td>2024-06-30</td></tr>
                <tr><td></td><td>blank</td></tr>
            </table>"#,
        ));
        assert_eq!(rows.len(), 2);
        let record = rows[0].as_ref().unwrap();
        assert_eq!(record.get("County"), Some("MASON"));
        assert!(rows[1].is_err());

        let mut target = WestVirginia::new();
        target.today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let out = target.format_record(record);
        assert_eq!(out.get("License Status"), Some("Expired"));
        assert_eq!(out.get("State"), Some("West Virginia"));
        assert_eq!(out.get("Last Name"), Some("MOTHMAN"));
        assert_eq!(out.get("Classification"), Some("Master"));
    }

    #[test]
    fn missing_expiration_leaves_status_empty() {
        let record = RawRecord::zip(KEYS, ["PL1", "JANE ROE"]);
        let out = WestVirginia::new().format_record(&record);
        assert_eq!(out.get("License Status"), Some(""));
        assert_eq!(out.get("Expiration Date"), Some(""));
    }
}
