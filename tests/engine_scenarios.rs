//! End-to-end runs of the scrape loop against a scripted contractor portal.

mod helpers;

use std::collections::HashSet;

use helpers::{MockSite, Scratch, run_once};
use licscrape::export::write_csv;
use licscrape::record::HREF;
use licscrape::scrape::{DetailPolicy, RowPolicy, ScrapeError, ScrapeOptions, Target};
use licscrape::targets::mississippi::Mississippi;
use licscrape::transport::Request;

const LIST_PATH: &str = "/ConsolidatedResults.cfm";
const DETAIL_PATH: &str = "/ConsolidatedDetail.cfm";

struct Licensee {
    id: u32,
    company: &'static str,
    license: &'static str,
    qualifier: &'static str,
}

const LICENSEES: &[Licensee] = &[
    Licensee { id: 1, company: "Delta Plumbing LLC", license: "R10001", qualifier: "Jane A. Doe" },
    Licensee { id: 2, company: "Gulf Pipe Co", license: "R10002", qualifier: "Smith, John" },
    Licensee { id: 3, company: "Magnolia Drains", license: "R10003", qualifier: "Dr. Ann Marie de la Cruz Jr." },
];

fn row(l: &Licensee) -> String {
    format!(
        r#"<tr class="TRodd"><td><a href="ConsolidatedDetail.cfm?id={}">View</a></td>
           <td>Commercial</td><td>{}</td><td>{}</td><td>1 Main St</td>
           <td>Jackson</td><td>MS</td><td>39201</td><td>601-555-0100</td></tr>"#,
        l.id, l.company, l.license
    )
}

fn list_page(rows: &[String]) -> String {
    format!("<html><body><table>{}</table></body></html>", rows.concat())
}

fn detail_page(l: &Licensee) -> String {
    format!(
        r#"<table>
            <tr><td>Miss. County</td><td>Hinds</td></tr>
            <tr><td>Expiration Date</td><td>12/31/2026</td></tr>
            <tr><td>PLUMBING</td><td>{}</td></tr>
        </table>"#,
        l.qualifier
    )
}

fn detail_id(request: &Request) -> Option<u32> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == "id")
        .and_then(|(_, v)| v.parse().ok())
}

fn is_detail(request: &Request) -> bool {
    request.url.path() == DETAIL_PATH
}

/// A portal listing `rows` on its first page and nothing after it.
fn portal(rows: Vec<String>, failing_detail: Option<u32>) -> MockSite {
    MockSite::new(move |request| match request.url.path() {
        LIST_PATH if request.param("startrow") == Some("1") => Some(list_page(&rows)),
        LIST_PATH => Some(list_page(&[])),
        DETAIL_PATH => {
            let id = detail_id(request)?;
            if Some(id) == failing_detail {
                return None;
            }
            LICENSEES.iter().find(|l| l.id == id).map(detail_page)
        }
        _ => None,
    })
}

fn all_rows() -> Vec<String> {
    LICENSEES.iter().map(row).collect()
}

fn options(target: &dyn Target) -> ScrapeOptions {
    ScrapeOptions::for_target(target)
}

#[tokio::test]
async fn three_rows_with_details_become_three_records() {
    let scratch = Scratch::new();
    let site = portal(all_rows(), None);
    let mut target = Mississippi;

    let opts = options(&target);
    let summary = run_once(&mut target, &site, &scratch, opts).await.unwrap();
    assert_eq!(summary.new_records, 3);
    assert_eq!(summary.pages, 2);
    assert_eq!(site.count(is_detail), 3);

    let cached = scratch.cached_records();
    assert_eq!(cached.len(), 3);
    assert_eq!(cached[1].get("Name"), Some("Smith, John"));
    assert_eq!(cached[0].get("County"), Some("Hinds"));

    let formatted: Vec<_> = cached.iter().map(|r| target.format_record(r)).collect();
    let names: Vec<_> = formatted
        .iter()
        .map(|r| (r.get("First Name").unwrap(), r.get("Last Name").unwrap()))
        .collect();
    assert_eq!(names, [("Jane", "Doe"), ("John", "Smith"), ("Ann", "de la Cruz")]);
    assert_eq!(formatted[2].get("License Number"), Some("R10003"));
    assert_eq!(formatted[2].get("Company"), Some("Magnolia Drains"));
    assert!(!scratch.path("cache.json.cursor.json").exists());
}

#[tokio::test]
async fn second_run_fetches_no_details_and_keeps_the_cache() {
    let scratch = Scratch::new();
    let mut target = Mississippi;
    let opts = options(&target);
    run_once(&mut target, &portal(all_rows(), None), &scratch, opts)
        .await
        .unwrap();
    let before = scratch.cache_text();

    let site = portal(all_rows(), None);
    let opts = options(&target);
    let summary = run_once(&mut target, &site, &scratch, opts).await.unwrap();
    assert_eq!(summary.new_records, 0);
    assert_eq!(summary.already_scraped, 3);
    assert_eq!(site.count(is_detail), 0);
    assert_eq!(scratch.cache_text(), before);
}

#[tokio::test]
async fn cached_keys_are_unique_after_repeated_runs() {
    let scratch = Scratch::new();
    let mut target = Mississippi;
    // The same licensee listed twice on one page is stored once.
    let mut rows = all_rows();
    rows.push(row(&LICENSEES[0]));
    for _ in 0..2 {
        let opts = options(&target);
        run_once(&mut target, &portal(rows.clone(), None), &scratch, opts)
            .await
            .unwrap();
    }
    let cached = scratch.cached_records();
    let keys: Vec<_> = cached.iter().map(|r| target.identity_key(r)).collect();
    let unique: HashSet<_> = keys.iter().collect();
    assert_eq!(keys.len(), 3);
    assert_eq!(unique.len(), keys.len());
}

fn rows_with_malformed_second() -> Vec<String> {
    vec![
        row(&LICENSEES[0]),
        r#"<tr class="TReven"><td>broken</td><td>row</td></tr>"#.to_string(),
        row(&LICENSEES[2]),
    ]
}

#[tokio::test]
async fn skip_policy_drops_the_malformed_row() {
    let scratch = Scratch::new();
    let mut target = Mississippi;
    let mut opts = options(&target);
    opts.row_policy = RowPolicy::Skip;

    let summary = run_once(&mut target, &portal(rows_with_malformed_second(), None), &scratch, opts)
        .await
        .unwrap();
    assert_eq!(summary.skipped_rows, 1);
    assert_eq!(summary.new_records, 2);
    let licenses: Vec<_> = scratch
        .cached_records()
        .iter()
        .map(|r| r.field("License").to_string())
        .collect();
    assert_eq!(licenses, ["R10001", "R10003"]);
}

#[tokio::test]
async fn fail_policy_names_the_malformed_row() {
    let scratch = Scratch::new();
    let mut target = Mississippi;
    let mut opts = options(&target);
    opts.row_policy = RowPolicy::Fail;

    let err = run_once(&mut target, &portal(rows_with_malformed_second(), None), &scratch, opts)
        .await
        .unwrap_err();
    match err.downcast_ref::<ScrapeError>() {
        Some(ScrapeError::Parse { target, page, row, .. }) => {
            assert_eq!(*target, "mississippi");
            assert_eq!((*page, *row), (1, 2));
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
    // The row before the malformed one was already stored.
    assert_eq!(scratch.cached_records().len(), 1);
}

#[tokio::test]
async fn detail_failure_policies() {
    for (policy, expected) in [
        (DetailPolicy::KeepPartial, Some(3)),
        (DetailPolicy::Drop, Some(2)),
        (DetailPolicy::Abort, None),
    ] {
        let scratch = Scratch::new();
        let mut target = Mississippi;
        let mut opts = options(&target);
        opts.detail_policy = policy;

        let result = run_once(&mut target, &portal(all_rows(), Some(2)), &scratch, opts).await;
        match expected {
            Some(records) => {
                let summary = result.unwrap();
                assert_eq!(summary.detail_failures, 1, "{policy:?}");
                assert_eq!(scratch.cached_records().len(), records, "{policy:?}");
            }
            None => {
                let err = result.unwrap_err();
                assert!(matches!(
                    err.downcast_ref::<ScrapeError>(),
                    Some(ScrapeError::Status { status: 500, .. })
                ));
            }
        }
    }
}

#[tokio::test]
async fn partial_record_keeps_its_list_fields() {
    let scratch = Scratch::new();
    let mut target = Mississippi;
    let mut opts = options(&target);
    opts.detail_policy = DetailPolicy::KeepPartial;
    run_once(&mut target, &portal(all_rows(), Some(2)), &scratch, opts)
        .await
        .unwrap();

    let cached = scratch.cached_records();
    let partial = cached.iter().find(|r| r.field("License") == "R10002").unwrap();
    assert_eq!(partial.field("Company"), "Gulf Pipe Co");
    assert!(partial.field(HREF).ends_with("ConsolidatedDetail.cfm?id=2"));
    assert!(!partial.contains("County"));
}

#[tokio::test]
async fn max_pages_caps_the_run() {
    let scratch = Scratch::new();
    let mut target = Mississippi;
    let mut opts = options(&target);
    opts.max_pages = Some(1);
    let site = portal(all_rows(), None);

    let summary = run_once(&mut target, &site, &scratch, opts).await.unwrap();
    assert_eq!(summary.pages, 1);
    assert_eq!(site.count(|r| r.url.path() == LIST_PATH), 1);
}

#[tokio::test]
async fn cache_exports_to_csv() {
    let scratch = Scratch::new();
    let mut target = Mississippi;
    let opts = options(&target);
    run_once(&mut target, &portal(all_rows(), None), &scratch, opts)
        .await
        .unwrap();

    let formatted: Vec<_> = scratch
        .cached_records()
        .iter()
        .map(|r| target.format_record(r))
        .collect();
    let mut out = Vec::new();
    let written = write_csv(&mut out, target.extra_columns(), &formatted).unwrap();
    assert_eq!(written, 3);

    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("File,Last Name,First Name,"));
    assert!(header.ends_with(",Full Name,County,Issue Date,Expiration Date,Fax Number,DBA Name"));
    let second = lines.nth(1).unwrap();
    assert!(second.contains("Smith,John"));
    assert!(second.contains("\"Smith, John\""));
}
