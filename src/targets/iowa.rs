//! Iowa Department of Public Health plumbing and mechanical licensees.
//!
//! A JSP search portal. Results are paged through a `<select>` in the
//! pagination container; detail pages are served by POSTing the folder and
//! person ids embedded in each row's `onclick` handler.

use std::sync::LazyLock;

use async_trait::async_trait;
use html_scraper::Html;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::forms::HtmlForm;
use crate::html::{by_id, cells, css, table_rows, text};
use crate::names::first_last;
use crate::record::{IdentityKey, NormalizedRecord, RawRecord};
use crate::scrape::{DetailPolicy, ParsedRows, RowError, ScrapeError, Target};
use crate::transport::{Page, Request, Transport};

const NAME: &str = "iowa";
const SEARCH_URL: &str =
    "https://dphregprograms.iowa.gov/PublicPortal/Iowa/IDPH/publicSearch/publicSearch.jsp";
const DETAIL_URL: &str =
    "https://dphregprograms.iowa.gov/PublicPortal/Iowa/IDPH/publicSearch/publicDetail.jsp";

/// Plumbing and Mechanical Systems Board.
const PROGRAM: &str = "PMSB";
/// "Active" in the status select.
const STATUS: &str = "75";

const KEYS: &[&str] = &["License", "Name", "Program", "City"];
const FOLDER_RSN: &str = "_folderRSN";
const PERSON_RSN: &str = "_pRSN";

static RSN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+),\s(\d+)").unwrap());

#[derive(Default)]
pub struct Iowa {
    current: Option<Page>,
    first_page: Option<Page>,
}

impl Iowa {
    pub fn new() -> Self {
        Self::default()
    }
}

fn search_request(page: &Page) -> Result<Request, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let mut form = HtmlForm::containing(&doc, &page.url, &css("select[name=program]"))
        .ok_or_else(|| ScrapeError::navigation(NAME, "search form not found"))?;
    form.set("program", PROGRAM);
    form.set("status", STATUS);

    let button = form.button_by_id("btn_search").map(str::to_string);
    Ok(button
        .and_then(|name| form.click(&name))
        .unwrap_or_else(|| form.submit()))
}

/// Request choosing `page` in the pagination select of `current`.
fn page_request(current: &Page, page: u32) -> Option<Request> {
    let doc = Html::parse_document(&current.body);
    let container = by_id(&doc, "paginateContainer")?;
    let select = container.select(&css("select")).next()?;
    let name = select.value().attr("name")?;

    let wanted = page.to_string();
    let offered = crate::forms::select_options(&doc, name)
        .iter()
        .any(|v| *v == wanted);
    if !offered {
        return None;
    }

    let mut form = HtmlForm::containing(&doc, &current.url, &css("#paginateContainer select"))?;
    form.set(name, wanted);
    Some(form.submit())
}

fn parse_results(page: &Page, page_number: u32) -> Result<ParsedRows, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let table = by_id(&doc, "resulttable")
        .ok_or_else(|| ScrapeError::layout(NAME, page_number, "result table not found"))?;

    let anchor_sel = css("a[onclick]");
    let rows = table_rows(table)
        .into_iter()
        .filter(|row| {
            row.parent()
                .and_then(html_scraper::ElementRef::wrap)
                .is_some_and(|p| p.value().name() == "tbody")
        })
        .map(|row| {
            let columns = cells(row);
            if columns.len() <= KEYS.len() {
                return Err(RowError::new(format!(
                    "expected {} cells, found {}",
                    KEYS.len() + 1,
                    columns.len()
                )));
            }
            let mut record = RawRecord::zip(KEYS, columns[1..].iter().map(|c| text(*c)));

            let script = row
                .select(&anchor_sel)
                .next()
                .and_then(|a| a.value().attr("onclick"))
                .ok_or_else(|| RowError::new("no detail link"))?;
            let caps = RSN_RE
                .captures(script)
                .ok_or_else(|| RowError::new(format!("no record ids in {script:?}")))?;
            record.insert(FOLDER_RSN, &caps[1]);
            record.insert(PERSON_RSN, &caps[2]);
            Ok(record)
        })
        .collect();
    Ok(rows)
}

fn parse_detail(page: &Page) -> Result<RawRecord, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let mut detail = RawRecord::new();

    let license: Vec<String> = doc.select(&css("#license_detail td")).map(text).collect();
    for (index, key) in [(3, "Status"), (4, "Issue"), (5, "Expiration")] {
        if let Some(value) = license.get(index) {
            detail.insert(key, value.as_str());
        }
    }

    let folder: Vec<String> = doc
        .select(&css("#folder_freeform_div table td"))
        .map(text)
        .collect();
    for (index, key) in [(0, "Type"), (1, "Speciality")] {
        if let Some(value) = folder.get(index) {
            detail.insert(key, value.as_str());
        }
    }

    if detail.is_empty() {
        return Err(ScrapeError::navigation(NAME, "detail page has no license table"));
    }
    Ok(detail)
}

#[async_trait]
impl Target for Iowa {
    fn name(&self) -> &'static str {
        NAME
    }

    fn portal_url(&self) -> &'static str {
        SEARCH_URL
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &["Full Name", "License Type", "Issue Date", "Expiration Date", "Speciality"]
    }

    fn page_limit(&self) -> u32 {
        530
    }

    fn has_detail(&self) -> bool {
        true
    }

    fn detail_policy(&self) -> DetailPolicy {
        DetailPolicy::KeepPartial
    }

    async fn prepare(&mut self, transport: &dyn Transport) -> Result<(), ScrapeError> {
        let search = transport.fetch(Request::get(Url::parse(SEARCH_URL)?)).await?;
        let request = search_request(&search)?;
        self.first_page = Some(transport.fetch(request).await?);
        Ok(())
    }

    async fn fetch_list_page(
        &mut self,
        transport: &dyn Transport,
        _partition: &str,
        page: u32,
    ) -> Result<Option<Page>, ScrapeError> {
        let served = if page == 1 {
            self.first_page
                .take()
                .ok_or_else(|| ScrapeError::navigation(NAME, "search was not submitted"))?
        } else {
            let Some(request) = self.current.as_ref().and_then(|c| page_request(c, page)) else {
                debug!(target_name = NAME, page, "Pagination select does not offer page");
                return Ok(None);
            };
            transport.fetch(request).await?
        };
        self.current = Some(served.clone());
        Ok(Some(served))
    }

    fn parse_rows(&self, page: &Page, page_number: u32) -> Result<ParsedRows, ScrapeError> {
        parse_results(page, page_number)
    }

    fn identity_key(&self, record: &RawRecord) -> IdentityKey {
        IdentityKey::from_fields(record, KEYS)
    }

    async fn fetch_detail(
        &mut self,
        transport: &dyn Transport,
        record: &RawRecord,
    ) -> Result<RawRecord, ScrapeError> {
        let request = Request::post(Url::parse(DETAIL_URL)?)
            .form_field("folderRSN", record.field(FOLDER_RSN))
            .form_field("pRSN", record.field(PERSON_RSN));
        let page = transport.fetch(request).await?;
        parse_detail(&page)
    }

    fn format_record(&self, record: &RawRecord) -> NormalizedRecord {
        let mut out = NormalizedRecord::new(self.extra_columns());
        let (first, last) = first_last(record.field("Name"));
        out.set("Last Name", last);
        out.set("First Name", first);
        out.set("City", record.field("City"));
        out.set("State", "Iowa");
        out.set("License Number", record.field("License"));
        out.set("License Status", record.field("Status"));
        out.set("Full Name", record.field("Name"));
        out.set("License Type", record.first_of(&["Type", "Program"]));
        out.set("Issue Date", record.field("Issue"));
        out.set("Expiration Date", record.field("Expiration"));
        out.set("Speciality", record.field("Speciality"));
        out
    }
}
