//! Utah Division of Occupational and Professional Licensing, plumbers.
//!
//! The license lookup keeps the search in the session; once the plumber
//! categories are submitted every result page is a plain GET.

use async_trait::async_trait;
use html_scraper::Html;
use url::Url;

use crate::forms::HtmlForm;
use crate::html::{cells, css, labeled_cell, text};
use crate::names::first_last;
use crate::record::{HREF, IdentityKey, NormalizedRecord, RawRecord};
use crate::scrape::{DetailPolicy, ParsedRows, RowError, ScrapeError, Target};
use crate::transport::{Page, Request, Transport};

const NAME: &str = "utah";
const SEARCH_URL: &str = "https://secure.utah.gov/llv/search/index.html";
const RESULTS_URL: &str = "https://secure.utah.gov/llv/search/search.html";
const KEYS: &[&str] = &["Name", "City", "Profession", "License", "Status"];

/// Plumber, then its apprentice, journeyman and master sub-categories.
const CATEGORIES: &[&str] = &["item247", "item247_1", "item247_2", "item247_3"];

const DETAIL_LABELS: &[(&str, &str)] = &[
    ("City, State, Zip, Country:", "Address"),
    ("Profession:", "Profession"),
    ("License Type:", "Type"),
    ("Obtained By:", "Obtained"),
    ("Original Issue Date:", "Issue"),
    ("Expiration Date:", "Expiration"),
];

pub struct Utah;

fn search_request(page: &Page) -> Result<Request, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let mut form = HtmlForm::containing(&doc, &page.url, &css("input[name=item247]"))
        .ok_or_else(|| ScrapeError::navigation(NAME, "profession search form not found"))?;
    for category in CATEGORIES {
        if !form.check(category) && form.value(category).is_none() {
            return Err(ScrapeError::navigation(NAME, format!("no {category} checkbox")));
        }
    }
    let request = form
        .button_named_by_label("Search")
        .and_then(|button| form.click(button));
    Ok(request.unwrap_or_else(|| form.submit()))
}

fn parse_results(page: &Page) -> ParsedRows {
    let doc = Html::parse_document(&page.body);
    let a_sel = css("a");
    doc.select(&css("table.resultsTable tr[class^=bg_]"))
        .map(|row| {
            let columns = cells(row);
            if columns.len() < KEYS.len() {
                return Err(RowError::new(format!(
                    "expected {} cells, found {}",
                    KEYS.len(),
                    columns.len()
                )));
            }
            let href = row
                .select(&a_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .ok_or_else(|| RowError::new("no detail link"))?;
            let href = page
                .url
                .join(href)
                .map_err(|e| RowError::new(format!("bad detail link {href:?}: {e}")))?;

            let mut record = RawRecord::zip(KEYS, columns.iter().map(|c| text(*c)));
            record.insert(HREF, href.to_string());
            Ok(record)
        })
        .collect()
}

fn parse_detail(page: &Page) -> Result<RawRecord, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let detail: RawRecord = DETAIL_LABELS
        .iter()
        .filter_map(|(label, key)| labeled_cell(&doc, label).map(|value| (*key, value)))
        .collect();
    if detail.is_empty() {
        return Err(ScrapeError::navigation(
            NAME,
            format!("license detail {} has no labelled fields", page.url),
        ));
    }
    Ok(detail)
}

#[async_trait]
impl Target for Utah {
    fn name(&self) -> &'static str {
        NAME
    }

    fn portal_url(&self) -> &'static str {
        SEARCH_URL
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &[
            "Full Name",
            "Profession",
            "License Type",
            "Obtained",
            "Issue Date",
            "Expiration Date",
        ]
    }

    fn page_limit(&self) -> u32 {
        351
    }

    fn seekable(&self) -> bool {
        true
    }

    fn has_detail(&self) -> bool {
        true
    }

    fn detail_policy(&self) -> DetailPolicy {
        DetailPolicy::Abort
    }

    fn detail_overrides(&self) -> &'static [&'static str] {
        &["Profession"]
    }

    async fn prepare(&mut self, transport: &dyn Transport) -> Result<(), ScrapeError> {
        let search = transport.fetch(Request::get(Url::parse(SEARCH_URL)?)).await?;
        transport.fetch(search_request(&search)?).await?;
        Ok(())
    }

    async fn fetch_list_page(
        &mut self,
        transport: &dyn Transport,
        _partition: &str,
        page: u32,
    ) -> Result<Option<Page>, ScrapeError> {
        let request = Request::get(Url::parse(RESULTS_URL)?).query("currentPage", page);
        Ok(Some(transport.fetch(request).await?))
    }

    fn parse_rows(&self, page: &Page, _page_number: u32) -> Result<ParsedRows, ScrapeError> {
        Ok(parse_results(page))
    }

    fn identity_key(&self, record: &RawRecord) -> IdentityKey {
        IdentityKey::from_fields(record, &[HREF])
    }

    async fn fetch_detail(
        &mut self,
        transport: &dyn Transport,
        record: &RawRecord,
    ) -> Result<RawRecord, ScrapeError> {
        let href = record
            .get(HREF)
            .ok_or_else(|| ScrapeError::navigation(NAME, "record has no detail link"))?;
        let page = transport.fetch(Request::get(Url::parse(href)?)).await?;
        parse_detail(&page)
    }

    fn format_record(&self, record: &RawRecord) -> NormalizedRecord {
        let mut out = NormalizedRecord::new(self.extra_columns());
        let (first, last) = first_last(record.field("Name"));
        out.set("File", record.field(HREF));
        out.set("Last Name", last);
        out.set("First Name", first);
        out.set("Street Address 1", record.field("Address"));
        out.set("City", record.field("City"));
        out.set("License Number", record.field("License"));
        out.set("License Status", record.field("Status"));
        out.set("Full Name", record.field("Name"));
        out.set("Profession", record.field("Profession"));
        out.set("License Type", record.field("Type"));
        out.set("Obtained", record.field("Obtained"));
        out.set("Issue Date", record.field("Issue"));
        out.set("Expiration Date", record.field("Expiration"));
        out
    }
}
