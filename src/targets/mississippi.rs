//! Mississippi State Board of Contractors, plumbing (class S107) contractors.

use async_trait::async_trait;
use html_scraper::Html;
use url::Url;

use crate::html::{cells, css, labeled_cell, text};
use crate::names::first_last;
use crate::record::{HREF, IdentityKey, NormalizedRecord, RawRecord};
use crate::scrape::{DetailPolicy, ParsedRows, RowError, ScrapeError, Target};
use crate::transport::{Page, Request, Transport};

const NAME: &str = "mississippi";
const RESULTS_URL: &str = "http://search.msboc.us/ConsolidatedResults.cfm";
const KEYS: &[&str] = &["Type", "Company", "License", "Address", "City", "State", "Zip", "Phone"];
const PAGE_SIZE: u32 = 250;

/// Detail page label and the record key its value fills. "PLUMBING" labels
/// the qualifying individual's name.
const DETAIL_LABELS: &[(&str, &str)] = &[
    ("Miss. County", "County"),
    ("Fax", "Fax"),
    ("DBA Name", "DBA Name"),
    ("Expiration Date", "Expiration"),
    ("First Issue", "Issue"),
    ("PLUMBING", "Name"),
];

pub struct Mississippi;

fn list_request(page: u32) -> Result<Request, ScrapeError> {
    let startrow = (page - 1) * PAGE_SIZE + 1;
    let mut request = Request::get(Url::parse(RESULTS_URL)?)
        .query("ContractorType", "")
        .query("maxrecords", PAGE_SIZE)
        .query("varDataSource", "BOC")
        .query("Keyword", "")
        .query("ClassCode", "S107");
    for empty in [
        "Co_Name", "Lic", "LicBegin", "LicEnd", "City", "State", "ZipCodes__county", "Zip",
        "Dba_name", "Mnrty_cat", "Expir_date_Begin", "Expir_date_End", "Expired", "Print_cert",
    ] {
        request = request.query(empty, "");
    }
    request = request
        .query("OrderBy", "Co_Name")
        .query("GeneralLiabilityInsuranceActive", "")
        .query("searchType", "")
        .query("Advanced", 1)
        .query("SearchStatus", "");
    for empty in [
        "issue_date_Begin", "issue_date_End", "enter_date_Begin", "enter_date_end", "qualname",
    ] {
        request = request.query(empty, "");
    }
    Ok(request.query("startrow", startrow))
}

fn parse_results(page: &Page) -> ParsedRows {
    let doc = Html::parse_document(&page.body);
    let a_sel = css("a");
    doc.select(&css("tr[class^=TR]"))
        .map(|row| {
            let columns = cells(row);
            if columns.len() <= KEYS.len() {
                return Err(RowError::new(format!(
                    "expected {} cells, found {}",
                    KEYS.len() + 1,
                    columns.len()
                )));
            }
            let href = columns[0]
                .select(&a_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .ok_or_else(|| RowError::new("no detail link"))?;
            let href = page
                .url
                .join(href)
                .map_err(|e| RowError::new(format!("bad detail link {href:?}: {e}")))?;

            let mut record = RawRecord::zip(KEYS, columns[1..].iter().map(|c| text(*c)));
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
            format!("detail page {} has no labelled fields", page.url),
        ));
    }
    Ok(detail)
}

#[async_trait]
impl Target for Mississippi {
    fn name(&self) -> &'static str {
        NAME
    }

    fn portal_url(&self) -> &'static str {
        RESULTS_URL
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &["Full Name", "County", "Issue Date", "Expiration Date", "Fax Number", "DBA Name"]
    }

    fn page_limit(&self) -> u32 {
        100
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
        IdentityKey::from_fields(record, KEYS)
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
        out.set("Company", record.field("Company"));
        out.set("License Number", record.field("License"));
        out.set("Street Address 1", record.field("Address"));
        out.set("City", record.field("City"));
        out.set("State", record.field("State"));
        out.set("Zip Code", record.field("Zip"));
        out.set("Phone", record.field("Phone"));
        out.set("Full Name", record.field("Name"));
        out.set("County", record.field("County"));
        out.set("Issue Date", record.field("Issue"));
        out.set("Expiration Date", record.field("Expiration"));
        out.set("Fax Number", record.field("Fax"));
        out.set("DBA Name", record.field("DBA Name"));
        out
    }
}
