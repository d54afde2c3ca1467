//! Search results grid extraction.
//!
//! The grid is found by its header labels, not by position, and each column
//! is read through the header it sits under. A page without a recognizable
//! grid is an error; a recognizable grid without data rows is an empty
//! result.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::html::{all_distinct, child_cells, class_mentions, element_text, find_column, own_rows};
use crate::types::{IcareError, IcareResult, PropertyRecord, NOT_AVAILABLE};

/// Tables the portal is known to render results into, tried first.
const PREFERRED_TABLES: &str = "table#searchResults, table.rgMasterTable";

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    width: usize,
    map_number: usize,
    owner: usize,
    address: usize,
    last_sale: usize,
}

impl Columns {
    fn locate(headers: &[String]) -> Option<Self> {
        let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        let columns = Self {
            width: headers.len(),
            map_number: find_column(&lower, "map #", &["map", "parcel"])?,
            owner: find_column(&lower, "owner", &["owner"])?,
            address: find_column(&lower, "property address", &["address"])?,
            last_sale: find_column(&lower, "last sale", &["sale"])?,
        };

        all_distinct(&[
            columns.map_number,
            columns.owner,
            columns.address,
            columns.last_sale,
        ])
        .then_some(columns)
    }
}

fn onclick_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"selectSearchRow\(\s*['"]([^'"]+)['"]"#).expect("onclick regex is valid")
    })
}

fn no_records_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)no (matching )?records|no (properties|results) (were )?found|did not (find|return) any")
            .expect("no-records regex is valid")
    })
}

/// Parse a search response into property records, in source order.
///
/// `base_url` is the URL the page was served from; relative detail links
/// are resolved against it.
pub fn extract_results(html: &str, base_url: &Url) -> IcareResult<Vec<PropertyRecord>> {
    let document = Html::parse_document(html);

    let Some((table, columns)) = find_results_table(&document) else {
        if no_records_re().is_match(&element_text(&document.root_element())) {
            debug!("portal reported no matching records");
            return Ok(Vec::new());
        }
        return Err(IcareError::malformed("search results table not found"));
    };

    let mut records = Vec::new();
    for (index, row) in own_rows(table).into_iter().enumerate() {
        let cells = child_cells(row, &["td"]);
        if cells.len() <= 1 || class_mentions(row, "pager") {
            continue;
        }
        records.push(read_row(row, &cells, columns, base_url, index)?);
    }

    debug!(count = records.len(), "extracted search results");
    Ok(records)
}

fn find_results_table(document: &Html) -> Option<(ElementRef<'_>, Columns)> {
    let preferred = Selector::parse(PREFERRED_TABLES).expect("table selector is valid");
    let any_table = Selector::parse("table").expect("table selector is valid");

    document
        .select(&preferred)
        .chain(document.select(&any_table))
        .find_map(|table| {
            let header = own_rows(table)
                .into_iter()
                .find(|row| !child_cells(*row, &["th"]).is_empty())?;
            let labels: Vec<String> = child_cells(header, &["th"])
                .iter()
                .map(|th| clean_header(&element_text(th)))
                .collect();
            Columns::locate(&labels).map(|cols| (table, cols))
        })
}

fn read_row(
    row: ElementRef<'_>,
    cells: &[ElementRef<'_>],
    columns: Columns,
    base_url: &Url,
    index: usize,
) -> IcareResult<PropertyRecord> {
    if cells.len() < columns.width {
        return Err(IcareError::malformed(format!(
            "results row {index} has {} cells, header has {}",
            cells.len(),
            columns.width
        )));
    }
    // Extra leading cells (the selection checkbox) sit outside the header.
    let cells = &cells[cells.len() - columns.width..];
    let text = |i: usize| element_text(&cells[i]);

    let detail_url = detail_link(row)
        .and_then(|href| base_url.join(&href).ok())
        .ok_or_else(|| {
            IcareError::malformed(format!("results row {index} has no detail link"))
        })?;

    Ok(PropertyRecord {
        map_number: text(columns.map_number),
        owner: text(columns.owner),
        property_address: text(columns.address),
        last_sale: last_sale_or_sentinel(&text(columns.last_sale)),
        detail_url: detail_url.to_string(),
    })
}

/// The relative link from the row's click handler, or from an anchor.
fn detail_link(row: ElementRef<'_>) -> Option<String> {
    if let Some(caps) = row
        .value()
        .attr("onclick")
        .and_then(|onclick| onclick_re().captures(onclick))
    {
        return caps.get(1).map(|m| m.as_str().to_string());
    }

    let anchor_sel = Selector::parse("a[href]").expect("anchor selector is valid");
    row.select(&anchor_sel)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| {
            !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:")
        })
        .map(String::from)
}

fn last_sale_or_sentinel(raw: &str) -> String {
    let blank = !raw.chars().any(|c| c.is_ascii_alphanumeric());
    if blank || raw.eq_ignore_ascii_case(NOT_AVAILABLE) {
        NOT_AVAILABLE.to_string()
    } else {
        raw.to_string()
    }
}

/// Strip the sort arrows the grid appends to header labels.
fn clean_header(label: &str) -> String {
    label.replace(['\u{25b2}', '\u{25bc}'], "").trim().to_string()
}
