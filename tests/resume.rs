//! Interrupted runs picking up from the saved page cursor.

mod helpers;

use helpers::{MockSite, Scratch, run_once};
use licscrape::scrape::{ScrapeOptions, Target};
use licscrape::store::{Cursor, ScrapeStore};
use licscrape::targets::maryland::Maryland;
use licscrape::targets::west_virginia::WestVirginia;
use licscrape::transport::{Method, Request};

fn wv_page(page: u32) -> String {
    let rows: String = (0..2)
        .map(|i| {
            format!(
                "<tr><td>PL{page}{i}</td><td>DOE, JOHN</td><td>ELKINS</td><td>RANDOLPH</td><td>Master</td><td>2030-01-01</td></tr>"
            )
        })
        .collect();
    format!("<table><tr><th>License</th></tr>{rows}</table>")
}

fn wv_page_number(request: &Request) -> u32 {
    request
        .param("PageNum_WVNUMBER")
        .and_then(|p| p.parse().ok())
        .unwrap_or(0)
}

/// West Virginia listing `pages` full pages, failing on `broken`.
fn wv_portal(pages: u32, broken: Option<u32>) -> MockSite {
    MockSite::new(move |request| {
        let page = wv_page_number(request);
        if Some(page) == broken {
            None
        } else if page <= pages {
            Some(wv_page(page))
        } else {
            Some("<table><tr><th>License</th></tr></table>".to_string())
        }
    })
}

fn saved_cursor(scratch: &Scratch, target: &dyn Target) -> Option<Cursor> {
    scratch.store_for(target).cursor().unwrap()
}

#[tokio::test]
async fn seekable_target_resumes_at_the_saved_page() {
    let scratch = Scratch::new();
    let mut target = WestVirginia::new();
    let opts = ScrapeOptions::for_target(&target);

    let err = run_once(&mut target, &wv_portal(4, Some(3)), &scratch, opts.clone()).await;
    assert!(err.is_err());
    assert_eq!(scratch.cached_records().len(), 4);
    assert_eq!(
        saved_cursor(&scratch, &target),
        Some(Cursor {
            partition: String::new(),
            partition_index: 0,
            page: 3,
        })
    );

    let site = wv_portal(4, None);
    let summary = run_once(&mut target, &site, &scratch, opts).await.unwrap();
    let pages: Vec<u32> = site.requests().iter().map(wv_page_number).collect();
    assert_eq!(pages, [3, 4, 5]);
    assert_eq!(summary.new_records, 4);
    assert_eq!(scratch.cached_records().len(), 8);
    assert_eq!(saved_cursor(&scratch, &target), None);
}

#[tokio::test]
async fn restart_ignores_the_cursor() {
    let scratch = Scratch::new();
    let mut target = WestVirginia::new();
    let mut opts = ScrapeOptions::for_target(&target);
    run_once(&mut target, &wv_portal(2, Some(2)), &scratch, opts.clone())
        .await
        .unwrap_err();

    opts.resume = false;
    let site = wv_portal(2, None);
    let summary = run_once(&mut target, &site, &scratch, opts).await.unwrap();
    assert_eq!(site.requests().first().map(wv_page_number), Some(1));
    assert_eq!(summary.already_scraped, 2);
    assert_eq!(summary.new_records, 2);
}

const MD_SEARCH_FORM: &str = r#"<form method="post" action="OP_search.cgi">
    <input type="hidden" name="calling_app" value="PLM::PLM_personal_location" />
    <input name="zip" />
    <input type="submit" name="Submit" value="Search" />
</form>"#;

fn md_results(zip: &str) -> String {
    format!(
        r#"<table>
            <tr><th>Name</th><th>City</th><th>State</th><th>Zip</th><th>Expires</th><th>Category</th><th>Insured</th><th>License</th></tr>
            <tr><td>ROE, RICHARD</td><td>BALTIMORE</td><td>MD</td><td>{zip}</td><td>2030-04-30</td><td>Master Plumber</td><td>Y</td><td>L{zip}</td></tr>
        </table>"#
    )
}

fn md_portal(broken_zip: Option<&'static str>) -> MockSite {
    MockSite::new(move |request| match request.method {
        Method::Get => Some(MD_SEARCH_FORM.to_string()),
        Method::Post => {
            let zip = request.param("zip")?;
            if Some(zip) == broken_zip {
                None
            } else {
                Some(md_results(zip))
            }
        }
    })
}

fn searched_zips(site: &MockSite) -> Vec<String> {
    site.requests()
        .iter()
        .filter(|r| r.method == Method::Post)
        .filter_map(|r| r.param("zip").map(str::to_string))
        .collect()
}

#[tokio::test]
async fn partitioned_target_resumes_at_the_saved_partition() {
    let scratch = Scratch::new();
    let zips = vec!["21201".to_string(), "21202".to_string(), "21203".to_string()];
    let mut target = Maryland::new(zips);
    let opts = ScrapeOptions::for_target(&target);

    run_once(&mut target, &md_portal(Some("21202")), &scratch, opts.clone())
        .await
        .unwrap_err();
    assert_eq!(
        saved_cursor(&scratch, &target),
        Some(Cursor {
            partition: "21202".to_string(),
            partition_index: 1,
            page: 1,
        })
    );
    // Maryland persists in batches; the failed run still saved what it had.
    assert_eq!(scratch.cached_records().len(), 1);

    let site = md_portal(None);
    run_once(&mut target, &site, &scratch, opts).await.unwrap();
    assert_eq!(searched_zips(&site), ["21202", "21203"]);

    let store = ScrapeStore::load(scratch.cache(), |r| target.identity_key(r)).unwrap();
    let licenses: Vec<_> = store.records().map(|r| r.field("License").to_string()).collect();
    assert_eq!(licenses, ["L21201", "L21202", "L21203"]);
}
