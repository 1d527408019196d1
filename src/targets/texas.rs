//! Texas State Board of Plumbing Examiners, master plumbers by county.
//!
//! The datamart shows one licensee per page. A county search lands on a
//! result list; the first licensee is opened and then the "next record"
//! button walks the rest, so each list page here yields exactly one row.

use async_trait::async_trait;
use html_scraper::Html;
use tracing::debug;
use url::Url;

use crate::forms::{HtmlForm, select_options};
use crate::html::{css, text, text_with};
use crate::names::first_last;
use crate::record::{IdentityKey, NormalizedRecord, RawRecord};
use crate::scrape::{ParsedRows, RowError, RowPolicy, ScrapeError, Target};
use crate::transport::{Page, Request, Transport};

const NAME: &str = "texas";
const START_URL: &str = "https://vo.licensing.hpc.texas.gov/datamart/selSearchType.do";
const BY_COUNTY_LINK: &str = "Search by County";
const BOARD: &str = "456";
const LICENSE_TYPE: &str = "4561";
/// Master plumber rank; 23 would be journeyman.
const RANK: &str = "24";
const PAGE_SIZE: &str = "10";

const DATA_VIEW_KEYS: &[&str] = &[
    "Name",
    "Type",
    "Status",
    "Expiration",
    "Certification of Insurance",
];
const ITEM_TABLE_KEYS: &[&str] = &["Address", "Phone"];
const ADDRESS_PARTS: &[&str] = &["City", "State", "County", "Zip Code"];

#[derive(Default)]
pub struct Texas {
    /// The county search form.
    criteria: Option<Page>,
    current: Option<Page>,
}

impl Texas {
    pub fn new() -> Self {
        Self::default()
    }
}

fn county_search_link(page: &Page) -> Result<Url, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let href = doc
        .select(&css(r#"form[name="BaseForm"] a"#))
        .find(|a| text(*a) == BY_COUNTY_LINK)
        .and_then(|a| a.value().attr("href"))
        .ok_or_else(|| ScrapeError::navigation(NAME, "no \"Search by County\" link"))?;
    Ok(page.url.join(href)?)
}

fn criteria_request(page: &Page) -> Result<Request, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let mut form = HtmlForm::containing(&doc, &page.url, &css("select[name=boardId]"))
        .ok_or_else(|| ScrapeError::navigation(NAME, "board selection form not found"))?;
    form.set("boardId", BOARD);
    form.set("licTypeId", LICENSE_TYPE);
    Ok(form.click("continue").unwrap_or_else(|| form.submit()))
}

fn county_search_request(criteria: &Page, county: &str) -> Result<Request, ScrapeError> {
    let doc = Html::parse_document(&criteria.body);
    let mut form = HtmlForm::containing(&doc, &criteria.url, &css("select[name=countyAgencyKey]"))
        .ok_or_else(|| ScrapeError::navigation(NAME, "county search form not found"))?;
    form.set("rankId", RANK);
    form.set("pageSize", PAGE_SIZE);
    form.set("countyAgencyKey", county);
    form.click("search")
        .ok_or_else(|| ScrapeError::navigation(NAME, "county search form has no search button"))
}

/// Link to the first licensee in a county's result list.
fn first_record_link(results: &Page) -> Option<Url> {
    let doc = Html::parse_document(&results.body);
    let href = doc
        .select(&css("span.item a"))
        .next()
        .and_then(|a| a.value().attr("href"))?;
    results.url.join(href).ok()
}

/// Request pressing the button named `name` on `page`, if it has one.
fn button_request(page: &Page, name: &str) -> Option<Request> {
    let doc = Html::parse_document(&page.body);
    let form = HtmlForm::containing(&doc, &page.url, &css(&format!("[name={name}]")))?;
    form.click(name)
}

fn parse_record(page: &Page) -> Result<RawRecord, RowError> {
    let doc = Html::parse_document(&page.body);
    let license = doc
        .select(&css("input[name=licNumber]"))
        .next()
        .and_then(|input| input.value().attr("value"))
        .ok_or_else(|| RowError::new("record page has no license number"))?;

    let mut record = RawRecord::new();
    record.insert("License", license.trim());
    for (key, td) in DATA_VIEW_KEYS.iter().zip(doc.select(&css("td.dataView"))) {
        record.insert(*key, text(td));
    }
    for (key, table) in ITEM_TABLE_KEYS.iter().zip(doc.select(&css("span.item table"))) {
        record.insert(*key, text_with(table, ", "));
    }
    Ok(record)
}

#[async_trait]
impl Target for Texas {
    fn name(&self) -> &'static str {
        NAME
    }

    fn portal_url(&self) -> &'static str {
        START_URL
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &[
            "Full Name",
            "License Type",
            "Expiration Date",
            "Certification of Insurance",
            "County",
        ]
    }

    fn row_policy(&self) -> RowPolicy {
        RowPolicy::Fail
    }

    async fn prepare(&mut self, transport: &dyn Transport) -> Result<(), ScrapeError> {
        let start = transport.fetch(Request::get(Url::parse(START_URL)?)).await?;
        let by_county = transport
            .fetch(Request::get(county_search_link(&start)?))
            .await?;
        let criteria = transport.fetch(criteria_request(&by_county)?).await?;
        self.criteria = Some(criteria);
        Ok(())
    }

    async fn partitions(&mut self, _transport: &dyn Transport) -> Result<Vec<String>, ScrapeError> {
        let criteria = self
            .criteria
            .as_ref()
            .ok_or_else(|| ScrapeError::navigation(NAME, "county search form was not reached"))?;
        let doc = Html::parse_document(&criteria.body);
        let counties: Vec<String> = select_options(&doc, "countyAgencyKey")
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect();
        if counties.is_empty() {
            return Err(ScrapeError::navigation(NAME, "county list is empty"));
        }
        Ok(counties)
    }

    async fn fetch_list_page(
        &mut self,
        transport: &dyn Transport,
        partition: &str,
        page: u32,
    ) -> Result<Option<Page>, ScrapeError> {
        if page > 1 {
            let next = self.current.as_ref().and_then(|c| button_request(c, "nextRow"));
            let Some(request) = next else {
                return Ok(None);
            };
            let served = transport.fetch(request).await?;
            self.current = Some(served.clone());
            return Ok(Some(served));
        }

        // Coming from a previous county's last record, return to the
        // criteria form the way the site expects.
        if let Some(request) = self.current.take().and_then(|c| button_request(&c, "newcriteria")) {
            self.criteria = Some(transport.fetch(request).await?);
        }
        let criteria = self
            .criteria
            .as_ref()
            .ok_or_else(|| ScrapeError::navigation(NAME, "county search form was not reached"))?;
        let results = transport.fetch(county_search_request(criteria, partition)?).await?;
        let Some(first) = first_record_link(&results) else {
            debug!(target_name = NAME, county = partition, "County has no licensees");
            return Ok(None);
        };
        let served = transport.fetch(Request::get(first)).await?;
        self.current = Some(served.clone());
        Ok(Some(served))
    }

    fn parse_rows(&self, page: &Page, _page_number: u32) -> Result<ParsedRows, ScrapeError> {
        Ok(vec![parse_record(page)])
    }

    fn identity_key(&self, record: &RawRecord) -> IdentityKey {
        IdentityKey::from_fields(record, &["License", "Name", "Type"])
    }

    fn format_record(&self, record: &RawRecord) -> NormalizedRecord {
        let mut out = NormalizedRecord::new(self.extra_columns());
        let address = record.field("Address");
        for (column, part) in ADDRESS_PARTS.iter().zip(address.split(',').map(str::trim)) {
            out.set(column, part);
        }
        let (first, last) = first_last(record.field("Name"));
        out.set("First Name", first);
        out.set("Last Name", last);
        out.set("License Number", record.field("License"));
        out.set("License Status", record.field("Status"));
        out.set("Street Address 1", address);
        out.set("Phone", record.field("Phone"));
        out.set("Full Name", record.field("Name"));
        out.set("License Type", record.field("Type"));
        out.set("Expiration Date", record.field("Expiration"));
        out.set("Certification of Insurance", record.field("Certification of Insurance"));
        out
    }
}
