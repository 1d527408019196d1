//! Element lookup helpers shared by the target parsers.
//!
//! Every lookup returns an `Option`; whether a miss means "try another
//! locator", "skip this row" or "stop" is decided by the caller.

use std::sync::LazyLock;

use html_scraper::{ElementRef, Html, Selector};
use regex::Regex;

/// Parse a selector literal.
///
/// Only used with selectors written in the source, so a parse failure is a
/// programming error.
pub fn css(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("invalid selector {selector:?}: {e}"))
}

/// Text content with every text node trimmed and empty ones dropped, joined
/// by `sep`.
pub fn text_with(el: ElementRef<'_>, sep: &str) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Stripped text content, text nodes concatenated without separator.
pub fn text(el: ElementRef<'_>) -> String {
    text_with(el, "")
}

/// Direct element children of `el` named `tag`.
pub fn children_named<'a>(el: ElementRef<'a>, tag: &str) -> Vec<ElementRef<'a>> {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == tag)
        .collect()
}

/// Direct `<td>` children of a row; nested tables are left alone.
pub fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    children_named(row, "td")
}

/// Rows that are direct children of the table (or of its `<tbody>`).
pub fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "tbody" | "thead" | "tfoot" => rows.extend(children_named(child, "tr")),
            _ => {}
        }
    }
    rows
}

pub fn by_id<'a>(doc: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(id))
}

/// Stripped text of the element with `id`.
pub fn text_by_id(doc: &Html, id: &str) -> Option<String> {
    by_id(doc, id).map(text)
}

/// The `<td>` right after the cell whose stripped text equals `label`.
///
/// Matches the common "Label: | Value" two-column detail layout.
pub fn labeled_cell(doc: &Html, label: &str) -> Option<String> {
    let td_sel = css("td");
    let label_cell = doc.select(&td_sel).find(|td| text(*td) == label)?;
    let value = label_cell
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sib| sib.value().name() == "td")?;
    Some(text(value))
}

/// The first `<span>` inside the nearest `<div>` around the text node `label`.
pub fn labeled_span(doc: &Html, label: &str) -> Option<String> {
    let node = doc
        .root_element()
        .descendants()
        .find(|node| node.value().as_text().is_some_and(|t| t.trim() == label))?;
    let div = node
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")?;
    let span = div
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "span")?;
    Some(text(span))
}

/// Target and argument of a `javascript:__doPostBack('target','arg')` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostBack {
    pub target: String,
    pub argument: String,
}

impl PostBack {
    pub fn parse(href: &str) -> Option<Self> {
        static POSTBACK_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"__doPostBack\('([^']*)',\s*'([^']*)'\)").unwrap());

        let caps = POSTBACK_RE.captures(href)?;
        Some(Self {
            target: caps[1].to_string(),
            argument: caps[2].to_string(),
        })
    }

    /// Postback behind an anchor's `href`.
    pub fn from_anchor(anchor: ElementRef<'_>) -> Option<Self> {
        anchor.value().attr("href").and_then(Self::parse)
    }
}

/// Pager link for `page` inside `container`, falling back to a "..." link
/// that follows every numbered link (the "more pages" jump WebForms grids
/// render past the visible window). A leading "..." jumps back to the
/// previous window and is never taken. `None` means there is nowhere further
/// to go.
pub fn pager_link(container: ElementRef<'_>, page: u32) -> Option<PostBack> {
    let a_sel = css("a");
    let wanted = page.to_string();
    let anchors: Vec<_> = container.select(&a_sel).collect();
    if let Some(anchor) = anchors.iter().find(|a| text(**a) == wanted) {
        return PostBack::from_anchor(*anchor);
    }

    let after_numbers = anchors
        .iter()
        .rposition(|a| text(*a).parse::<u32>().is_ok())
        .map_or(0, |i| i + 1);
    anchors[after_numbers..]
        .iter()
        .find(|a| text(**a) == "...")
        .and_then(|a| PostBack::from_anchor(*a))
}
