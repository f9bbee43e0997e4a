//! Workbook formatter.
//!
//! Every sheet gets the same treatment: a bold, centred header row, thin
//! borders on every populated cell, columns as wide as their longest text
//! plus 3 characters, the populated range registered as a banded table named
//! `Table_<sheet>`, and the header row frozen.
//!
//! The layout is a pure function of the sheet's rows, so formatting twice
//! yields the same result. Applying it to a concrete file goes through the
//! [`SheetStyler`] capability.

use crate::workbook::{SheetEntry, Workbook};
use std::collections::HashSet;

/// Row written into a sheet that has no content at all.
pub const NO_DATA: &str = "No data detected";

/// Padding added to the longest text of a column.
pub const WIDTH_PADDING: f64 = 3.0;

/// Widest column the xlsx format accepts.
const MAX_COLUMN_WIDTH: f64 = 255.0;

/// Styling computed for one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    /// Table column captions: the header row, made unique and non-empty.
    pub captions: Vec<String>,
    /// Width of each column in characters.
    pub widths: Vec<f64>,
    /// Last populated row (0-based).
    pub last_row: u32,
    /// Last row of the registered table. One past `last_row` when the sheet
    /// has only a header, since a table needs a data row.
    pub table_last_row: u32,
    pub table_name: String,
}

impl SheetLayout {
    pub fn column_count(&self) -> usize {
        self.captions.len()
    }
}

/// Styling operations on one sheet of a concrete spreadsheet file.
///
/// xlsx cells carry their own format, so `style_header` and `set_borders`
/// write the cell values together with their style.
pub trait SheetStyler {
    type Error;

    /// Write the header row bold and centred.
    fn style_header(&mut self, header: &[String]) -> Result<(), Self::Error>;

    /// Write the data rows with a thin border, padding each row to `width`
    /// cells.
    fn set_borders(&mut self, rows: &[Vec<String>], width: usize) -> Result<(), Self::Error>;

    fn auto_width(&mut self, widths: &[f64]) -> Result<(), Self::Error>;

    /// Register rows `0..=last_row` of the first `captions.len()` columns as
    /// a banded table.
    fn register_table(
        &mut self,
        name: &str,
        captions: &[String],
        last_row: u32,
    ) -> Result<(), Self::Error>;

    fn freeze_header(&mut self) -> Result<(), Self::Error>;
}

/// Prepare every sheet of `workbook` for output.
///
/// Sheets without content receive a single `No data detected` row; cell
/// values are otherwise untouched. Returns one layout per sheet, in order.
pub fn format_workbook(workbook: &mut Workbook) -> Vec<SheetLayout> {
    for sheet in workbook.sheets_mut() {
        if sheet.is_empty() {
            sheet.rows = vec![vec![NO_DATA.to_string()]];
        }
    }

    let mut table_names = HashSet::new();
    workbook
        .sheets()
        .iter()
        .map(|sheet| {
            let table_name = unique_table_name(sheet.name(), &mut table_names);
            layout(sheet, table_name)
        })
        .collect()
}

/// Compute the layout of one sheet.
pub fn layout(sheet: &SheetEntry, table_name: String) -> SheetLayout {
    let width = sheet.width().max(1);
    let header = sheet.rows().first().cloned().unwrap_or_default();

    let mut widths = vec![0usize; width];
    for row in sheet.rows() {
        for (col, cell) in row.iter().enumerate() {
            widths[col] = widths[col].max(cell.chars().count());
        }
    }

    let last_row = sheet.rows().len().saturating_sub(1) as u32;
    let table_last_row = if last_row == 0 { 1 } else { last_row };

    SheetLayout {
        captions: table_captions(&header, width),
        widths: widths
            .into_iter()
            .map(|w| (w as f64 + WIDTH_PADDING).min(MAX_COLUMN_WIDTH))
            .collect(),
        last_row,
        table_last_row,
        table_name,
    }
}

/// Apply `layout` to `styler`.
pub fn apply<S: SheetStyler>(
    styler: &mut S,
    sheet: &SheetEntry,
    layout: &SheetLayout,
) -> Result<(), S::Error> {
    let (header, body) = match sheet.rows().split_first() {
        Some((header, body)) => (header.as_slice(), body),
        None => (&[][..], &[][..]),
    };
    styler.style_header(header)?;
    styler.set_borders(body, layout.column_count())?;
    styler.auto_width(&layout.widths)?;
    styler.register_table(&layout.table_name, &layout.captions, layout.table_last_row)?;
    styler.freeze_header()
}

/// Header captions usable as table column names.
///
/// A header that already has unique, non-empty captions is used as is.
/// Otherwise blanks become `Column<n>` and repeats get a numeric suffix.
fn table_captions(header: &[String], width: usize) -> Vec<String> {
    let padded: Vec<String> = (0..width)
        .map(|i| header.get(i).cloned().unwrap_or_default())
        .collect();

    let mut seen = HashSet::new();
    let valid = padded
        .iter()
        .all(|c| !c.trim().is_empty() && seen.insert(c.to_lowercase()));
    if valid {
        return padded;
    }

    let mut seen = HashSet::new();
    padded
        .into_iter()
        .enumerate()
        .map(|(i, caption)| {
            let base = match caption.trim() {
                "" => format!("Column{}", i + 1),
                text => text.to_string(),
            };
            let mut name = base.clone();
            let mut k = 2;
            while !seen.insert(name.to_lowercase()) {
                name = format!("{base}{k}");
                k += 1;
            }
            name
        })
        .collect()
}

/// `Table_<sheet>` reduced to characters valid in a table name, unique
/// within the workbook.
fn unique_table_name(sheet_name: &str, taken: &mut HashSet<String>) -> String {
    let stem: String = sheet_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let base = format!("Table_{stem}");

    let mut name = base.clone();
    let mut k = 2;
    while !taken.insert(name.to_lowercase()) {
        name = format!("{base}_{k}");
        k += 1;
    }
    name
}
