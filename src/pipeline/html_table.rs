//! HTML table markup → cell grids.
//!
//! Layout engines describe table structure as HTML because it can express
//! merged cells. This module flattens each `<table>` into a rectangular-ish
//! grid of cell text: a cell spanning several columns or rows is repeated in
//! every slot it covers, so no text is lost and positions stay aligned.
//!
//! Nested tables are not descended into; their text is part of the
//! enclosing cell.

use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

const MAX_COLSPAN: usize = 100;
const MAX_ROWSPAN: usize = 1000;

/// One `<table>` element after span expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    /// Header captions, if the markup marks a header (`<thead>` or a
    /// leading row of `<th>` cells). Several header rows are merged column
    /// by column.
    pub header: Option<Vec<String>>,
    /// Body rows. Rows may differ in length.
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    /// Widest row, header included.
    pub fn width(&self) -> usize {
        let body = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        body.max(self.header.as_ref().map_or(0, Vec::len))
    }
}

struct RawRow<'a> {
    cells: Vec<ElementRef<'a>>,
    in_thead: bool,
}

/// Parse every top-level `<table>` in `html`, in document order.
///
/// Tables without any cell are skipped.
pub fn parse_tables(html: &str) -> Vec<ParsedTable> {
    let fragment = Html::parse_fragment(html);
    let Ok(table_selector) = Selector::parse("table") else {
        return Vec::new();
    };

    fragment
        .select(&table_selector)
        .filter(|table| !has_table_ancestor(table))
        .filter_map(|table| parse_table(&table))
        .collect()
}

fn has_table_ancestor(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "table")
}

fn parse_table(table: &ElementRef) -> Option<ParsedTable> {
    let raw_rows = direct_rows(table);
    let grid = expand_spans(&raw_rows);
    if grid.iter().all(Vec::is_empty) {
        return None;
    }

    // Header rows: the <thead> rows, else a leading row of only <th> cells.
    let mut header_count = raw_rows.iter().take_while(|r| r.in_thead).count();
    if header_count == 0 {
        if let Some(first) = raw_rows.first() {
            let all_th = !first.cells.is_empty()
                && first.cells.iter().all(|c| c.value().name() == "th");
            if all_th {
                header_count = 1;
            }
        }
    }

    let mut rows = grid;
    let header_rows: Vec<Vec<String>> = rows.drain(..header_count.min(rows.len())).collect();
    let header = (!header_rows.is_empty()).then(|| merge_header_rows(&header_rows));

    Some(ParsedTable { header, rows })
}

/// `<tr>` children of the table and of its `<thead>`/`<tbody>`/`<tfoot>`
/// sections, skipping nested tables.
fn direct_rows<'a>(table: &ElementRef<'a>) -> Vec<RawRow<'a>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(raw_row(&child, false)),
            section @ ("thead" | "tbody" | "tfoot") => {
                for tr in child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "tr")
                {
                    rows.push(raw_row(&tr, section == "thead"));
                }
            }
            _ => {}
        }
    }
    rows
}

fn raw_row<'a>(tr: &ElementRef<'a>, in_thead: bool) -> RawRow<'a> {
    let cells = tr
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect();
    RawRow { cells, in_thead }
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn span(cell: &ElementRef, attr: &str, max: usize) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, max)
}

/// Lay cells out on a grid, repeating spanned text.
fn expand_spans(rows: &[RawRow]) -> Vec<Vec<String>> {
    // column → (rows still covered, text)
    let mut carried: BTreeMap<usize, (usize, String)> = BTreeMap::new();
    let mut grid = Vec::with_capacity(rows.len());

    for row in rows {
        let mut out: Vec<String> = Vec::new();
        let mut cells = row.cells.iter();
        let mut col = 0;

        loop {
            if let Some((remaining, text)) = carried.get_mut(&col) {
                out.push(text.clone());
                *remaining -= 1;
                if *remaining == 0 {
                    carried.remove(&col);
                }
                col += 1;
                continue;
            }

            if let Some(cell) = cells.next() {
                let text = cell_text(cell);
                let colspan = span(cell, "colspan", MAX_COLSPAN);
                let rowspan = span(cell, "rowspan", MAX_ROWSPAN);
                for k in 0..colspan {
                    out.push(text.clone());
                    if rowspan > 1 {
                        carried.insert(col + k, (rowspan - 1, text.clone()));
                    }
                }
                col += colspan;
                continue;
            }

            // Out of cells: fill gaps up to any rowspan still covering a
            // column further right.
            match carried.range(col..).next() {
                Some((&next, _)) if next > col => {
                    out.push(String::new());
                    col += 1;
                }
                _ => break,
            }
        }

        grid.push(out);
    }

    grid
}

fn merge_header_rows(rows: &[Vec<String>]) -> Vec<String> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    (0..width)
        .map(|c| {
            let mut parts: Vec<&str> = Vec::new();
            for row in rows {
                if let Some(text) = row.get(c) {
                    if !text.is_empty() && parts.last() != Some(&text.as_str()) {
                        parts.push(text);
                    }
                }
            }
            parts.join(" ")
        })
        .collect()
}
