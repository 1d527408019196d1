//! Nebraska Department of Labor contractor registrations, NAICS 23
//! (construction).

use async_trait::async_trait;
use html_scraper::Html;
use tracing::debug;
use url::Url;

use crate::forms::HtmlForm;
use crate::html::{cells, css, text, text_with};
use crate::record::{HREF, IdentityKey, NormalizedRecord, RawRecord};
use crate::scrape::{DetailPolicy, ParsedRows, RowError, ScrapeError, Target};
use crate::transport::{Page, Request, Transport};

const NAME: &str = "nebraska";
const SEARCH_URL: &str = "https://dol.nebraska.gov/conreg/Search";
const RESULTS_URL: &str = "https://dol.nebraska.gov/conreg/Search/AdvancedSearch";
const NAICS_SELECT_ID: &str = "AdvancedSearch_NAICSCode";
const NAICS_CONSTRUCTION: &str = "23";
const RESULTS_PER_PAGE: u32 = 1000;

const KEYS: &[&str] = &["Option", "Registered", "Expires"];

/// `#printPage` cell index and the record key it fills.
const DETAIL_CELLS: &[(usize, &str)] = &[
    (0, "Contractor"),
    (1, "Corporation"),
    (2, "Entity"),
    (4, "City"),
    (5, "State"),
    (6, "Zip"),
    (7, "Phone"),
    (8, "Registration Number"),
    (11, "Employees"),
    (12, "Worker Compensation Status"),
];

pub struct Nebraska;

fn search_request(page: &Page) -> Result<Request, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let select = css(&format!("#{NAICS_SELECT_ID}"));
    let mut form = HtmlForm::containing(&doc, &page.url, &select)
        .ok_or_else(|| ScrapeError::navigation(NAME, "advanced search form not found"))?;
    form.set_by_id(NAICS_SELECT_ID, NAICS_CONSTRUCTION);

    let submit = doc
        .select(&css("button[type=submit]"))
        .next()
        .and_then(|b| b.value().attr("name"))
        .and_then(|name| form.click(name));
    Ok(submit.unwrap_or_else(|| form.submit()))
}

fn parse_results(page: &Page) -> ParsedRows {
    let doc = Html::parse_document(&page.body);
    let a_sel = css("a");
    doc.select(&css("tr.fieldset-outline"))
        .map(|row| {
            let columns = cells(row);
            let Some(first) = columns.first() else {
                return Err(RowError::new("row has no cells"));
            };

            let info = text_with(*first, "|");
            let mut parts = info.split('|');
            let company = parts.next().unwrap_or_default().to_string();
            let address = parts.collect::<Vec<_>>().join(". ");

            let href = row
                .select(&a_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .ok_or_else(|| RowError::new("no detail link"))?;
            let href = page
                .url
                .join(href)
                .map_err(|e| RowError::new(format!("bad detail link {href:?}: {e}")))?;

            let mut record = RawRecord::zip(KEYS, columns[1..].iter().map(|c| text(*c)));
            record.insert("Company", company);
            record.insert("Address", address);
            record.insert(HREF, href.to_string());
            Ok(record)
        })
        .collect()
}

fn parse_detail(page: &Page) -> Result<RawRecord, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let values: Vec<String> = doc.select(&css("#printPage table td")).map(text).collect();
    let detail: RawRecord = DETAIL_CELLS
        .iter()
        .filter_map(|(index, key)| values.get(*index).map(|v| (*key, v.as_str())))
        .collect();
    if detail.is_empty() {
        return Err(ScrapeError::navigation(
            NAME,
            format!("detail page {} has no printPage table", page.url),
        ));
    }
    Ok(detail)
}

#[async_trait]
impl Target for Nebraska {
    fn name(&self) -> &'static str {
        NAME
    }

    fn portal_url(&self) -> &'static str {
        SEARCH_URL
    }

    fn extra_columns(&self) -> &'static [&'static str] {
        &[
            "Certificate Expires",
            "Certificate Registered",
            "Contractor Name",
            "Corporation Name",
            "Entity",
            "Registration Number",
            "Employees",
            "Worker Compensation Status",
        ]
    }

    fn page_limit(&self) -> u32 {
        20
    }

    fn seekable(&self) -> bool {
        true
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
        // The search criteria live in the session; the results are then
        // paged with plain GETs.
        let results = transport.fetch(request).await?;
        debug!(target_name = NAME, url = %results.url, "Submitted advanced search");
        Ok(())
    }

    async fn fetch_list_page(
        &mut self,
        transport: &dyn Transport,
        _partition: &str,
        page: u32,
    ) -> Result<Option<Page>, ScrapeError> {
        let request = Request::get(Url::parse(RESULTS_URL)?)
            .query("page", page)
            .query("resultsPerPage", RESULTS_PER_PAGE);
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
        let mut address = record.field("Address").split(". ");
        out.set("File", record.field(HREF));
        out.set("Company", record.field("Company"));
        out.set("Street Address 1", address.next().unwrap_or_default());
        out.set("Street Address 2", address.next().unwrap_or_default());
        out.set("City", record.field("City"));
        out.set("State", record.field("State"));
        out.set("Zip Code", record.field("Zip"));
        out.set("Phone", record.field("Phone"));
        out.set("Certificate Expires", record.field("Expires"));
        out.set("Certificate Registered", record.field("Registered"));
        out.set("Contractor Name", record.field("Contractor"));
        out.set("Corporation Name", record.field("Corporation"));
        out.set("Entity", record.field("Entity"));
        out.set("Registration Number", record.field("Registration Number"));
        out.set("Employees", record.field("Employees"));
        out.set("Worker Compensation Status", record.field("Worker Compensation Status"));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, body: &str) -> Page {
        Page {
            url: Url::parse(url).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn first_cell_splits_into_company_and_address() {
        let rows = parse_results(&page(
            RESULTS_URL,
            r#"<table><tr class="fieldset-outline">
                <td><a href="/conreg/Search/Details/4410">Husker Plumbing Inc</a><br/>100 O St<br/>Suite 2</td>
                <td>Option A</td><td>01/05/2024</td><td>01/05/2026</td>
            </tr></table>"#,
        ));
        let record = rows[0].as_ref().unwrap();
        assert_eq!(record.get("Company"), Some("Husker Plumbing Inc"));
        assert_eq!(record.get("Address"), Some("100 O St. Suite 2"));
        assert_eq!(record.get("Expires"), Some("01/05/2026"));
        assert_eq!(record.get(HREF), Some("https://dol.nebraska.gov/conreg/Search/Details/4410"));

        let out = Nebraska.format_record(record);
        assert_eq!(out.get("Street Address 1"), Some("100 O St"));
        assert_eq!(out.get("Street Address 2"), Some("Suite 2"));
        assert_eq!(out.get("Certificate Registered"), Some("01/05/2024"));
    }

    #[test]
    fn single_line_address_leaves_second_line_empty() {
        let record = RawRecord::zip(&["Address"], ["100 O St"]);
        let out = Nebraska.format_record(&record);
        assert_eq!(out.get("Street Address 1"), Some("100 O St"));
        assert_eq!(out.get("Street Address 2"), Some(""));
    }

    #[test]
    fn detail_cells_by_index() {
        let cells: String = (0..13).map(|i| format!("<td>v{i}</td>")).collect();
        let detail = parse_detail(&page(
            RESULTS_URL,
            &format!(r#"<div id="printPage"><table><tr>{cells}</tr></table></div>"#),
        ))
        .unwrap();
        assert_eq!(detail.get("Contractor"), Some("v0"));
        assert_eq!(detail.get("City"), Some("v4"));
        assert_eq!(detail.get("Worker Compensation Status"), Some("v12"));
        assert!(parse_detail(&page(RESULTS_URL, "<p>Not found</p>")).is_err());
    }

    #[test]
    fn search_picks_construction_naics() {
        let request = search_request(&page(
            SEARCH_URL,
            r#"<form method="post" action="/conreg/Search/AdvancedSearch">
                <select id="AdvancedSearch_NAICSCode" name="AdvancedSearch.NAICSCode">
                    <option value="">Any</option><option value="23">Construction</option>
                </select>
                <button type="submit" name="submit" value="Search">Search</button>
            </form>"#,
        ))
        .unwrap();
        assert_eq!(request.param("AdvancedSearch.NAICSCode"), Some("23"));
        assert_eq!(request.url.as_str(), RESULTS_URL);
    }
}
