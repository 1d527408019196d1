//! Rhode Island Department of Labor and Training, licensed plumbers.
//!
//! A WebForms application where both the pager and each licensee's detail
//! view are postbacks from the results grid. Rows carry the postback target
//! of their detail link so the detail can be requested from the list page
//! that produced them.

use async_trait::async_trait;
use html_scraper::Html;
use tracing::debug;
use url::Url;

use crate::forms::HtmlForm;
use crate::html::{PostBack, by_id, css, labeled_span, pager_link, text};
use crate::names::first_last;
use crate::record::{IdentityKey, NormalizedRecord, RawRecord};
use crate::scrape::{DetailPolicy, ParsedRows, RowError, ScrapeError, Target};
use crate::transport::{Page, Request, Transport};

const NAME: &str = "rhode-island";
const SEARCH_URL: &str = "https://dltweb.dlt.ri.gov/profregsonline/LicenseSearch";
const TRADE_SELECT_ID: &str = "MainContent_cboTrade";
const SEARCH_BUTTON_ID: &str = "MainContent_btnSearch";
const RESULTS_GRID_ID: &str = "MainContent_gvLicenseSearchResults";
const DETAIL_LINK_PREFIX: &str = "MainContent_gvLicenseSearchResults_lbLicenseDetails_";
const LICENSES_GRID_ID: &str = "MainContent_gvLicenses";

/// Record key holding the detail link's postback target.
const DETAIL_TARGET: &str = "_postback";

const DETAIL_LABELS: &[&str] = &[
    "Name",
    "Address",
    "Home Phone",
    "Business Phone",
    "Company",
    "Expiration Date",
    "Insurance Name",
    "Insurance Termination Date",
];
const LICENSE_CELLS: &[&str] = &["License", "Status", "Code", "Issue"];

#[derive(Default)]
pub struct RhodeIsland {
    current: Option<Page>,
    first_page: Option<Page>,
}

impl RhodeIsland {
    pub fn new() -> Self {
        Self::default()
    }
}

fn search_request(page: &Page) -> Result<Request, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let mut form = HtmlForm::containing(&doc, &page.url, &css(&format!("#{TRADE_SELECT_ID}")))
        .ok_or_else(|| ScrapeError::navigation(NAME, "license search form not found"))?;
    form.set_by_id(TRADE_SELECT_ID, "Plumber");
    let button = form
        .button_by_id(SEARCH_BUTTON_ID)
        .ok_or_else(|| ScrapeError::navigation(NAME, "search button not found"))?;
    form.click(button)
        .ok_or_else(|| ScrapeError::navigation(NAME, "search button not found"))
}

fn page_request(current: &Page, page: u32) -> Option<Request> {
    let doc = Html::parse_document(&current.body);
    let grid = by_id(&doc, RESULTS_GRID_ID)?;
    let link = pager_link(grid, page)?;
    let form = HtmlForm::extract(&doc, &current.url, &css("form"))?;
    Some(form.postback(&link.target, &link.argument))
}

fn detail_request(list_page: &Page, postback_target: &str) -> Option<Request> {
    let doc = Html::parse_document(&list_page.body);
    let form = HtmlForm::extract(&doc, &list_page.url, &css("form"))?;
    Some(form.postback(postback_target, ""))
}

fn parse_results(page: &Page) -> ParsedRows {
    let doc = Html::parse_document(&page.body);
    doc.select(&css(&format!("a[id^={DETAIL_LINK_PREFIX}]")))
        .map(|anchor| {
            let license = text(anchor);
            if license.is_empty() {
                return Err(RowError::new("detail link has no license number"));
            }
            let postback = PostBack::from_anchor(anchor)
                .ok_or_else(|| {
                    RowError::new(format!("detail link for {license} is not a postback"))
                })?;
            let mut record = RawRecord::new();
            record.insert("License", license);
            record.insert(DETAIL_TARGET, postback.target);
            Ok(record)
        })
        .collect()
}

fn parse_detail(page: &Page) -> Result<RawRecord, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let mut detail: RawRecord = DETAIL_LABELS
        .iter()
        .filter_map(|label| labeled_span(&doc, label).map(|value| (*label, value)))
        .collect();

    let Some(licenses) = by_id(&doc, LICENSES_GRID_ID) else {
        return Err(ScrapeError::navigation(NAME, "detail view has no license grid"));
    };
    let td_sel = css("td");
    for (key, td) in LICENSE_CELLS.iter().zip(licenses.select(&td_sel)) {
        detail.insert(*key, text(td));
    }
    Ok(detail)
}

#[async_trait]
impl Target for RhodeIsland {
    fn name(&self) -> &'static str {
        NAME
    }

    fn portal_url(&self) -> &'static str {
        SEARCH_URL
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &[
            "Full Name",
            "Business Phone",
            "License Code",
            "Issue Date",
            "Expiration Date",
            "Insurance Name",
            "Insurance Termination Date",
        ]
    }

    fn page_limit(&self) -> u32 {
        258
    }

    fn has_detail(&self) -> bool {
        true
    }

    fn detail_policy(&self) -> DetailPolicy {
        DetailPolicy::Abort
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
                debug!(target_name = NAME, page, "Pager has no link to page");
                return Ok(None);
            };
            transport.fetch(request).await?
        };
        self.current = Some(served.clone());
        Ok(Some(served))
    }

    fn parse_rows(&self, page: &Page, _page_number: u32) -> Result<ParsedRows, ScrapeError> {
        Ok(parse_results(page))
    }

    fn identity_key(&self, record: &RawRecord) -> IdentityKey {
        IdentityKey::from_fields(record, &["License"])
    }

    async fn fetch_detail(
        &mut self,
        transport: &dyn Transport,
        record: &RawRecord,
    ) -> Result<RawRecord, ScrapeError> {
        let request = self
            .current
            .as_ref()
            .and_then(|list| detail_request(list, record.field(DETAIL_TARGET)))
            .ok_or_else(|| {
                ScrapeError::navigation(NAME, "no results page to post the detail link from")
            })?;
        let page = transport.fetch(request).await?;
        parse_detail(&page)
    }

    fn format_record(&self, record: &RawRecord) -> NormalizedRecord {
        let mut out = NormalizedRecord::new(self.extra_columns());
        let (first, last) = first_last(record.field("Name"));
        out.set("Last Name", last);
        out.set("First Name", first);
        out.set("Street Address 1", record.field("Address"));
        out.set("State", "Rhode Island");
        out.set("Phone", record.first_of(&["Home Phone", "Business Phone"]));
        out.set("Company", record.field("Company"));
        out.set("License Number", record.field("License"));
        out.set("License Status", record.field("Status"));
        out.set("Full Name", record.field("Name"));
        out.set("Business Phone", record.field("Business Phone"));
        out.set("License Code", record.field("Code"));
        out.set("Issue Date", record.field("Issue"));
        out.set("Expiration Date", record.field("Expiration Date"));
        out.set("Insurance Name", record.field("Insurance Name"));
        out.set("Insurance Termination Date", record.field("Insurance Termination Date"));
        out
    }
}
