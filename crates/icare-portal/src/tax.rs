//! Tax summary extraction from a property's tax details page.
//!
//! Page layout (iCare "Datalet" views):
//!
//! ```text
//! div[name=TAX_STUB]   heading table, then a table with td.DataletData = stub number
//! div[name=TAX_SUM]    heading table ("Tax Summary"), then table#Summary…
//!                        header row: Year | (label) | … | Amount Paid | Balance Due
//!                        one row per billing period, optionally a "Total" row
//! input#hdTaxYear      tax year code
//! ```
//!
//! A missing panel means the county publishes no tax data for the parcel.
//! Individual currency cells that fail to parse degrade to warnings.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::currency::Money;
use crate::html::{all_distinct, child_cells, class_mentions, element_text, find_column, own_rows};
use crate::types::{
    Amount, AmountColumn, IcareError, IcareResult, TaxPeriod, TaxSummary, TaxWarning,
};

const DEFAULT_TITLE: &str = "Tax Summary";
const TOTAL_YEAR: &str = "Total";

/// Column positions within the summary table.
#[derive(Debug, Clone, Copy)]
struct SummaryColumns {
    width: usize,
    year: usize,
    label: Option<usize>,
    paid: usize,
    due: usize,
}

impl SummaryColumns {
    fn locate(headers: &[String]) -> Option<Self> {
        let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        let columns = Self {
            width: headers.len(),
            year: find_column(&lower, "year", &["year"])?,
            label: lower.iter().position(String::is_empty),
            paid: find_column(&lower, "amount paid", &["paid"])?,
            due: find_column(&lower, "balance due", &["balance", "due"])?,
        };

        let mut indices = vec![columns.year, columns.paid, columns.due];
        indices.extend(columns.label);
        all_distinct(&indices).then_some(columns)
    }
}

/// One body row before currency parsing.
struct RawRow {
    year: String,
    label: String,
    paid: String,
    due: String,
}

/// Parse a tax details page into a [`TaxSummary`].
pub fn extract_tax_summary(html: &str) -> IcareResult<TaxSummary> {
    let document = Html::parse_document(html);

    let panel = find_panel(&document).ok_or(IcareError::TaxDataUnavailable)?;

    let (table, columns) = find_summary_table(panel).ok_or_else(|| {
        IcareError::malformed("tax summary panel has no recognizable summary table")
    })?;

    let title = heading_table(panel)
        .filter(|t| t.id() != table.id())
        .map(|t| element_text(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let mut raw_periods = Vec::new();
    let mut reported_total = None;
    for row in own_rows(table).into_iter().skip(1) {
        let cells = child_cells(row, &["td", "th"]);
        if cells.len() != columns.width {
            continue;
        }
        let text = |i: usize| element_text(&cells[i]);
        let raw = RawRow {
            year: text(columns.year),
            label: columns.label.map(&text).unwrap_or_default(),
            paid: text(columns.paid),
            due: text(columns.due),
        };
        if raw.year.is_empty() && raw.paid.is_empty() && raw.due.is_empty() {
            continue;
        }

        let is_total = raw.year.to_lowercase().starts_with("total") || class_mentions(row, "total");
        if is_total {
            reported_total.get_or_insert(raw);
        } else {
            raw_periods.push(raw);
        }
    }

    let mut warnings = Vec::new();
    let periods: Vec<TaxPeriod> = raw_periods
        .into_iter()
        .map(|raw| TaxPeriod {
            amount_paid: parse_amount(&raw.year, AmountColumn::AmountPaid, &raw.paid, &mut warnings),
            balance_due: parse_amount(&raw.year, AmountColumn::BalanceDue, &raw.due, &mut warnings),
            year: raw.year,
            label: raw.label,
        })
        .collect();

    let total = compute_total(&periods, reported_total.as_ref(), &mut warnings);

    let summary = TaxSummary {
        title,
        stub_number: stub_number(&document),
        tax_year_code: tax_year_code(&document),
        periods,
        total,
        warnings,
    };

    for w in &summary.warnings {
        warn!(warning = ?w, "tax summary degraded");
    }
    debug!(periods = summary.periods.len(), "extracted tax summary");
    Ok(summary)
}

/// Sum the parsed period values and compare with the portal's own total.
///
/// The computed sum is always what `total` carries; a disagreeing reported
/// total is surfaced as a [`TaxWarning::TotalMismatch`].
fn compute_total(
    periods: &[TaxPeriod],
    reported: Option<&RawRow>,
    warnings: &mut Vec<TaxWarning>,
) -> TaxPeriod {
    let paid: Money = periods.iter().filter_map(|p| p.amount_paid.value()).sum();
    let due: Money = periods.iter().filter_map(|p| p.balance_due.value()).sum();

    if let Some(reported) = reported {
        for (column, raw, computed) in [
            (AmountColumn::AmountPaid, &reported.paid, paid),
            (AmountColumn::BalanceDue, &reported.due, due),
        ] {
            match Money::parse(raw) {
                Ok(value) if value != computed => warnings.push(TaxWarning::TotalMismatch {
                    column,
                    reported: value.to_string(),
                    computed: computed.to_string(),
                }),
                Ok(_) => {}
                Err(_) => warnings.push(TaxWarning::UnparsableAmount {
                    year: TOTAL_YEAR.to_string(),
                    column,
                    raw: raw.clone(),
                }),
            }
        }
    }

    TaxPeriod {
        year: TOTAL_YEAR.to_string(),
        label: String::new(),
        amount_paid: Amount::Parsed(paid),
        balance_due: Amount::Parsed(due),
    }
}

fn parse_amount(
    year: &str,
    column: AmountColumn,
    raw: &str,
    warnings: &mut Vec<TaxWarning>,
) -> Amount {
    match Money::parse(raw) {
        Ok(m) => Amount::Parsed(m),
        Err(_) => {
            warnings.push(TaxWarning::UnparsableAmount {
                year: year.to_string(),
                column,
                raw: raw.to_string(),
            });
            Amount::Unparsable {
                raw: raw.to_string(),
            }
        }
    }
}

/// The tax summary section: `div[name=TAX_SUM]`, or the nearest `div`
/// around a "Tax Summary" heading.
fn find_panel(document: &Html) -> Option<ElementRef<'_>> {
    let named = Selector::parse("div[name='TAX_SUM']").expect("panel selector is valid");
    if let Some(panel) = document.select(&named).next() {
        return Some(panel);
    }

    let heading_sel = Selector::parse("td, th, h1, h2, h3, h4, span")
        .expect("heading selector is valid");
    document
        .select(&heading_sel)
        .find(|el| element_text(el).eq_ignore_ascii_case(DEFAULT_TITLE))
        .and_then(|heading| {
            heading
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "div")
        })
}

fn heading_table(panel: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let table_sel = Selector::parse("table").expect("table selector is valid");
    panel.select(&table_sel).next()
}

fn find_summary_table(panel: ElementRef<'_>) -> Option<(ElementRef<'_>, SummaryColumns)> {
    let preferred = Selector::parse("table[id^='Summary']").expect("summary selector is valid");
    let any_table = Selector::parse("table").expect("table selector is valid");

    panel
        .select(&preferred)
        .chain(panel.select(&any_table))
        .find_map(|table| {
            let header = own_rows(table).into_iter().next()?;
            let labels: Vec<String> = child_cells(header, &["td", "th"])
                .iter()
                .map(element_text)
                .collect();
            SummaryColumns::locate(&labels).map(|cols| (table, cols))
        })
}

fn stub_number(document: &Html) -> String {
    let stub_sel = Selector::parse("div[name='TAX_STUB'] td.DataletData")
        .expect("stub selector is valid");
    document
        .select(&stub_sel)
        .map(|td| element_text(&td))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn tax_year_code(document: &Html) -> String {
    let year_sel = Selector::parse("input#hdTaxYear, input[name='hdTaxYear']")
        .expect("tax year selector is valid");
    document
        .select(&year_sel)
        .find_map(|input| input.value().attr("value"))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}
