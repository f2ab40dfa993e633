use std::fmt::Write;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use crate::model::Row;

static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Parse a table using its first row as column names.
///
/// Blank header cells fall back to `column_<N>` (1-based). Data rows whose
/// cells are all empty are dropped.
pub fn parse_table(table: ElementRef) -> Vec<Row> {
    let mut rows = table.select(&TR);
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };

    let mut headers: Vec<String> = header_row.select(&TH).map(cell_text).collect();
    if headers.is_empty() {
        headers = header_row.select(&TD).map(cell_text).collect();
    }

    rows.filter_map(|tr| {
        let row: Row = tr
            .select(&TD)
            .enumerate()
            .map(|(i, td)| (column_key(&headers, i), cell_text(td)))
            .collect();
        if row.values().all(String::is_empty) {
            None
        } else {
            Some(row)
        }
    })
    .collect()
}

/// True when any `th` in the table reads exactly `label`.
pub fn has_header_label(table: ElementRef, label: &str) -> bool {
    table.select(&TH).any(|th| cell_text(th) == label)
}

/// Render rows as `key: value; ` pairs, one line per row.
pub fn flatten_rows(rows: &[Row]) -> String {
    let mut out = String::new();
    for row in rows {
        for (key, value) in row {
            let _ = write!(out, "{}: {}; ", key, value);
        }
        out.push('\n');
    }
    out.trim().to_string()
}

pub(crate) fn cell_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn column_key(headers: &[String], idx: usize) -> String {
    match headers.get(idx) {
        Some(h) if !h.is_empty() => h.clone(),
        _ => format!("column_{}", idx + 1),
    }
}
