//! Small DOM helpers shared by the extractors.

use scraper::{ElementRef, Selector};

/// Text content with whitespace (including `&nbsp;`) collapsed.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rows that belong to `table` itself, not to tables nested in its cells.
///
/// The portal lays pages out with nested tables, so a plain `tr` selector
/// would mix layout rows into the data.
pub fn own_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let tr_sel = Selector::parse("tr").expect("row selector is valid");
    table
        .select(&tr_sel)
        .filter(|row| {
            row.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "table")
                .is_some_and(|owner| owner.id() == table.id())
        })
        .collect()
}

/// Direct children of `row` with one of the given tag names.
pub fn child_cells<'a>(row: ElementRef<'a>, tags: &[&str]) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| tags.contains(&el.value().name()))
        .collect()
}

/// Whether the element's `class` attribute mentions `needle` (case-insensitive).
pub fn class_mentions(el: ElementRef<'_>, needle: &str) -> bool {
    el.value()
        .attr("class")
        .is_some_and(|c| c.to_ascii_lowercase().contains(needle))
}

/// Index of the header labelled `exact` (case-insensitive), or failing
/// that, of the first header containing one of `needles`.
///
/// `headers` must already be lower-cased.
pub fn find_column(headers: &[String], exact: &str, needles: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| h == exact)
        .or_else(|| {
            needles
                .iter()
                .find_map(|needle| headers.iter().position(|h| h.contains(needle)))
        })
}

/// Whether no two columns were resolved to the same index.
pub fn all_distinct(indices: &[usize]) -> bool {
    indices
        .iter()
        .enumerate()
        .all(|(i, a)| indices[i + 1..].iter().all(|b| a != b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_own_rows_skip_nested_tables() {
        let doc = Html::parse_fragment(
            r#"<table id="outer">
                 <tr><td>a</td><td><table><tr><td>inner</td></tr></table></td></tr>
                 <tr><td>b</td></tr>
               </table>"#,
        );
        let sel = Selector::parse("table#outer").unwrap();
        let outer = doc.select(&sel).next().unwrap();
        let rows = own_rows(outer);
        assert_eq!(rows.len(), 2);
        assert_eq!(child_cells(rows[1], &["td"]).len(), 1);
    }

    #[test]
    fn test_element_text_collapses_whitespace() {
        let doc = Html::parse_fragment("<p> 125&nbsp;MAIN\n   ST </p>");
        let sel = Selector::parse("p").unwrap();
        let p = doc.select(&sel).next().unwrap();
        assert_eq!(element_text(&p), "125 MAIN ST");
    }

    #[test]
    fn test_find_column_prefers_exact_label() {
        let headers: Vec<String> = ["year", "", "due date", "amount paid", "balance due"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        assert_eq!(find_column(&headers, "balance due", &["due"]), Some(4));
        assert_eq!(find_column(&headers, "paid", &["paid"]), Some(3));
        assert_eq!(find_column(&headers, "owner", &["owner"]), None);
    }

    #[test]
    fn test_all_distinct() {
        assert!(all_distinct(&[0, 2, 3]));
        assert!(!all_distinct(&[0, 2, 0]));
        assert!(all_distinct(&[]));
    }
}
