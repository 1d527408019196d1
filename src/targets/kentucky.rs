//! Kentucky Department of Housing, Buildings and Construction plumbers.
//!
//! The portal's search grid is fed by a JSON endpoint; each list page is one
//! POST with the page number, and every row already holds the full record.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::json::parse_json_with_context;
use crate::names::first_last;
use crate::record::{IdentityKey, NormalizedRecord, RawRecord};
use crate::scrape::{ParsedRows, RowError, ScrapeError, Target};
use crate::transport::{Page, Request, Transport};

const NAME: &str = "kentucky";
const SEARCH_URL: &str = "https://ky.joportal.com/License/Search";
/// Division of Plumbing.
const DIVISION: u32 = 103;
/// Journeyman and master plumber license types.
const LICENSE_TYPES: [u32; 2] = [13, 14];
const PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    rows: Vec<serde_json::Value>,
}

pub struct Kentucky;

/// List request for `page`, stamped with `nd` (milliseconds since the epoch)
/// the way the grid widget does.
fn list_request(page: u32, nd: i64) -> Result<Request, ScrapeError> {
    let mut request = Request::post(Url::parse(SEARCH_URL)?).query("Division", DIVISION);
    for license_type in LICENSE_TYPES {
        request = request.query("LicenseType", license_type);
    }
    for license_type in LICENSE_TYPES {
        request = request.query("multiselect_LicenseType", license_type);
    }
    for empty in ["LicenseNumber", "BusinessName", "LastName", "FirstName", "County"] {
        request = request.query(empty, "");
    }

    Ok(request
        .form_field("_search", "false")
        .form_field("nd", nd)
        .form_field("PageSize", PAGE_SIZE)
        .form_field("PageNumber", page)
        .form_field("OrderBy", "Number")
        .form_field("OrderByDirection", "asc"))
}

fn parse_response(body: &str) -> Result<ParsedRows, ScrapeError> {
    let response: SearchResponse = parse_json_with_context(body).map_err(ScrapeError::Json)?;
    Ok(response
        .rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| match row {
            serde_json::Value::Object(object) => Ok(RawRecord::from_json_object(object)),
            other => Err(RowError::new(format!("row {i} is not an object: {other}"))),
        })
        .collect())
}

#[async_trait]
impl Target for Kentucky {
    fn name(&self) -> &'static str {
        NAME
    }

    fn portal_url(&self) -> &'static str {
        SEARCH_URL
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &[
            "Full Name",
            "License Type",
            "Expiration Date",
            "Application Date",
            "Renewal Date",
        ]
    }

    fn page_limit(&self) -> u32 {
        249
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
        let nd = chrono::Utc::now().timestamp_millis();
        let page = transport.fetch(list_request(page, nd)?).await?;
        Ok(Some(page))
    }

    fn parse_rows(&self, page: &Page, _page_number: u32) -> Result<ParsedRows, ScrapeError> {
        parse_response(&page.body)
    }

    fn identity_key(&self, record: &RawRecord) -> IdentityKey {
        IdentityKey::from_fields(record, &["Number"])
    }

    fn format_record(&self, record: &RawRecord) -> NormalizedRecord {
        let mut out = NormalizedRecord::new(self.extra_columns());
        let (first, last) = first_last(record.field("FullName"));
        out.set("Last Name", last);
        out.set("First Name", first);
        out.set("City", record.field("City"));
        out.set("State", record.field("CountyState"));
        out.set("License Number", record.field("Number"));
        out.set("License Status", record.field("Status"));
        out.set("Full Name", record.field("FullName"));
        out.set("License Type", record.field("Type"));
        out.set("Expiration Date", record.field("ExpirationDate"));
        out.set("Application Date", record.field("ApplicationDate"));
        out.set("Renewal Date", record.field("RenewalDate"));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_request_matches_grid_widget() {
        let request = list_request(7, 1_700_000_000_000).unwrap();
        assert_eq!(request.param("Division"), Some("103"));
        assert_eq!(
            request.query.iter().filter(|(k, _)| k == "LicenseType").count(),
            2
        );
        assert_eq!(request.param("PageNumber"), Some("7"));
        assert_eq!(request.param("PageSize"), Some("50"));
        assert_eq!(request.param("nd"), Some("1700000000000"));
        assert_eq!(request.param("OrderBy"), Some("Number"));
    }

    #[test]
    fn rows_become_records() {
        let rows = parse_response(
            r#"{"page": 1, "rows": [
                {"Number": 40112, "FullName": "Smith, John", "City": "Lexington",
                 "CountyState": "KY", "Status": "Active", "Type": "Master Plumber",
                 "ExpirationDate": "2026-02-28", "RenewalDate": null},
                "garbage"
            ]}"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        let record = rows[0].as_ref().unwrap();
        assert_eq!(record.get("Number"), Some("40112"));
        assert_eq!(record.get("RenewalDate"), Some(""));
        assert!(rows[1].is_err());

        let out = Kentucky.format_record(record);
        assert_eq!(out.get("Last Name"), Some("Smith"));
        assert_eq!(out.get("First Name"), Some("John"));
        assert_eq!(out.get("License Number"), Some("40112"));
        assert_eq!(out.get("State"), Some("KY"));
    }

    #[test]
    fn missing_rows_is_an_empty_page() {
        assert!(parse_response(r#"{"total": 0}"#).unwrap().is_empty());
    }

    #[test]
    fn html_error_page_is_a_json_error() {
        assert!(matches!(
            parse_response("<html>Server Error</html>"),
            Err(ScrapeError::Json(_))
        ));
    }
}
