//! "MyLicense" WebForms lookup portals (Delaware, Indiana, New Hampshire).
//!
//! All three run the same vendor application: a search form with profession
//! and license-type selects, a `datagrid_results` grid paged by postback, and
//! a GET detail page per licensee whose fields carry generated element ids.

use async_trait::async_trait;
use html_scraper::Html;
use tracing::debug;
use url::Url;

use crate::forms::HtmlForm;
use crate::html::{by_id, cells, css, pager_link, table_rows, text, text_by_id};
use crate::record::{HREF, IdentityKey, NormalizedRecord, RawRecord};
use crate::scrape::{DetailPolicy, ParsedRows, RowError, ScrapeError, Target};
use crate::transport::{Page, Request, Transport};

const RESULTS_GRID: &str = "datagrid_results";
const PROFESSION_SELECT: &str = "t_web_lookup__profession_name";
const LICENSE_TYPE_SELECT: &str = "t_web_lookup__license_type_name";
const SEARCH_BUTTON: &str = "sch_button";

/// What differs between MyLicense deployments.
pub struct MyLicenseSite {
    pub name: &'static str,
    pub search_url: &'static str,
    pub profession: Option<&'static str>,
    pub license_type: Option<&'static str>,
    /// Record keys for the grid columns, in column order.
    pub row_keys: &'static [&'static str],
    pub identity: &'static [&'static str],
    pub page_limit: u32,
    /// Detail page element id and the record key it fills.
    pub detail_fields: &'static [(&'static str, &'static str)],
    pub detail_policy: DetailPolicy,
    pub extra_columns: &'static [&'static str],
    pub format: fn(&RawRecord, &mut NormalizedRecord),
}

pub struct MyLicense {
    site: &'static MyLicenseSite,
    /// Last results page served; its form and pager drive the next postback.
    current: Option<Page>,
    /// Results page returned by the search, handed out as page 1.
    first_page: Option<Page>,
}

impl MyLicense {
    pub fn new(site: &'static MyLicenseSite) -> Self {
        Self {
            site,
            current: None,
            first_page: None,
        }
    }

    fn search_request(&self, page: &Page) -> Result<Request, ScrapeError> {
        let doc = Html::parse_document(&page.body);
        let mut form = HtmlForm::extract(&doc, &page.url, &css("form"))
            .ok_or_else(|| ScrapeError::navigation(self.site.name, "search form not found"))?;

        for (select, value) in [
            (PROFESSION_SELECT, self.site.profession),
            (LICENSE_TYPE_SELECT, self.site.license_type),
        ] {
            if let Some(value) = value {
                if form.value(select).is_none() {
                    return Err(ScrapeError::navigation(
                        self.site.name,
                        format!("search form has no {select} select"),
                    ));
                }
                form.set(select, value);
            }
        }

        form.click(SEARCH_BUTTON)
            .ok_or_else(|| ScrapeError::navigation(self.site.name, "search button not found"))
    }

    /// Postback to `page` from the results page currently shown, `None` when
    /// its pager offers no way there.
    fn page_request(&self, current: &Page, page: u32) -> Option<Request> {
        let doc = Html::parse_document(&current.body);
        let grid = by_id(&doc, RESULTS_GRID)?;
        let link = pager_link(grid, page)?;
        let form = HtmlForm::extract(&doc, &current.url, &css("form"))?;
        Some(form.postback(&link.target, &link.argument))
    }

    pub(crate) fn parse_detail(&self, page: &Page) -> Result<RawRecord, ScrapeError> {
        let doc = Html::parse_document(&page.body);
        let detail: RawRecord = self
            .site
            .detail_fields
            .iter()
            .filter_map(|(id, key)| text_by_id(&doc, id).map(|value| (*key, value)))
            .collect();
        if detail.is_empty() {
            return Err(ScrapeError::navigation(
                self.site.name,
                format!("detail page {} has none of the expected fields", page.url),
            ));
        }
        Ok(detail)
    }
}

/// Grid rows between the header row and the pager row.
fn parse_grid(
    site: &MyLicenseSite,
    page: &Page,
    page_number: u32,
) -> Result<ParsedRows, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let grid = by_id(&doc, RESULTS_GRID)
        .ok_or_else(|| ScrapeError::layout(site.name, page_number, "results grid not found"))?;
    let rows = table_rows(grid);
    if rows.len() < 2 {
        return Ok(Vec::new());
    }

    let a_sel = css("a");
    let parsed = rows[1..rows.len() - 1]
        .iter()
        .map(|row| {
            let columns = cells(*row);
            if columns.len() < site.row_keys.len() {
                return Err(RowError::new(format!(
                    "expected {} cells, found {}",
                    site.row_keys.len(),
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

            let mut record = RawRecord::zip(site.row_keys, columns.iter().map(|c| text(*c)));
            record.insert(HREF, href.to_string());
            Ok(record)
        })
        .collect();
    Ok(parsed)
}

#[async_trait]
impl Target for MyLicense {
    fn name(&self) -> &'static str {
        self.site.name
    }

    fn portal_url(&self) -> &'static str {
        self.site.search_url
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        self.site.extra_columns
    }

    fn page_limit(&self) -> u32 {
        self.site.page_limit
    }

    fn has_detail(&self) -> bool {
        true
    }

    fn detail_policy(&self) -> DetailPolicy {
        self.site.detail_policy
    }

    async fn prepare(&mut self, transport: &dyn Transport) -> Result<(), ScrapeError> {
        let search_page = transport
            .fetch(Request::get(Url::parse(self.site.search_url)?))
            .await?;
        let request = self.search_request(&search_page)?;
        let results = transport.fetch(request).await?;
        debug!(target_name = self.site.name, url = %results.url, "Submitted search");
        self.first_page = Some(results);
        Ok(())
    }

    async fn fetch_list_page(
        &mut self,
        transport: &dyn Transport,
        _partition: &str,
        page: u32,
    ) -> Result<Option<Page>, ScrapeError> {
        let served = if page == 1 {
            match self.first_page.take() {
                Some(first) => first,
                None => {
                    return Err(ScrapeError::navigation(
                        self.site.name,
                        "search was not submitted",
                    ));
                }
            }
        } else {
            let Some(current) = &self.current else {
                return Ok(None);
            };
            let Some(request) = self.page_request(current, page) else {
                debug!(target_name = self.site.name, page, "Pager has no link to page");
                return Ok(None);
            };
            transport.fetch(request).await?
        };
        self.current = Some(served.clone());
        Ok(Some(served))
    }

    fn parse_rows(&self, page: &Page, page_number: u32) -> Result<ParsedRows, ScrapeError> {
        parse_grid(self.site, page, page_number)
    }

    fn identity_key(&self, record: &RawRecord) -> IdentityKey {
        IdentityKey::from_fields(record, self.site.identity)
    }

    async fn fetch_detail(
        &mut self,
        transport: &dyn Transport,
        record: &RawRecord,
    ) -> Result<RawRecord, ScrapeError> {
        let href = record
            .get(HREF)
            .ok_or_else(|| ScrapeError::navigation(self.site.name, "record has no detail link"))?;
        let page = transport.fetch(Request::get(Url::parse(href)?)).await?;
        self.parse_detail(&page)
    }

    fn format_record(&self, record: &RawRecord) -> NormalizedRecord {
        let mut out = NormalizedRecord::new(self.site.extra_columns);
        let (first, last) = crate::names::first_last(record.field("Name"));
        out.set("File", record.field(HREF));
        out.set("Last Name", last);
        out.set("First Name", first);
        out.set("License Number", record.field("License"));
        out.set("License Status", record.field("Status"));
        (self.site.format)(record, &mut out);
        out
    }
}
