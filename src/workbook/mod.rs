//! In-memory workbook model and its serialisation.
//!
//! A [`Workbook`] is an ordered list of named sheets of text cells. Sheet
//! names are claimed through a [`SheetNamer`] on insertion, so two sheets can
//! never share a name. Entries are immutable once added; only the formatter
//! may fill an empty sheet with its placeholder row.
//!
//! [`format`] derives per-sheet styling, [`xlsx`] writes the result with
//! rust_xlsxwriter.

pub mod format;
pub mod xlsx;

use crate::pipeline::naming::{SheetNamer, EMPTY_SHEET};
use std::fmt;
use std::ops::AddAssign;
use tracing::warn;

/// Single cell of the placeholder sheet of a job that produced nothing.
pub const NO_READABLE_DATA: &str = "No readable data detected";

/// Longest text an xlsx cell holds, in characters.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Columns per worksheet.
pub const MAX_COLUMNS: usize = 16_384;

/// Rows per worksheet.
pub const MAX_ROWS: usize = 1_048_576;

/// What [`fit_to_sheet`] had to cut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clipped {
    /// Cells whose text was truncated.
    pub cells: usize,
    /// Rows that lost trailing columns.
    pub narrowed_rows: usize,
    /// Rows dropped past the last worksheet row.
    pub dropped_rows: usize,
}

impl Clipped {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for Clipped {
    fn add_assign(&mut self, other: Self) {
        self.cells += other.cells;
        self.narrowed_rows += other.narrowed_rows;
        self.dropped_rows += other.dropped_rows;
    }
}

impl fmt::Display for Clipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "clipped to worksheet limits ({} cell(s) truncated to {MAX_CELL_CHARS} chars, \
             {} row(s) cut to {MAX_COLUMNS} columns, {} row(s) dropped)",
            self.cells, self.narrowed_rows, self.dropped_rows
        )
    }
}

/// Truncate `text` to [`MAX_CELL_CHARS`]. Returns whether it was cut.
pub fn clip_cell(text: &mut String) -> bool {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => {
            text.truncate(end);
            true
        }
        None => false,
    }
}

/// Cut `rows` down to what a worksheet can store.
pub fn fit_to_sheet(rows: &mut Vec<Vec<String>>) -> Clipped {
    let mut clipped = Clipped::default();
    if rows.len() > MAX_ROWS {
        clipped.dropped_rows = rows.len() - MAX_ROWS;
        rows.truncate(MAX_ROWS);
    }
    for row in rows.iter_mut() {
        if row.len() > MAX_COLUMNS {
            row.truncate(MAX_COLUMNS);
            clipped.narrowed_rows += 1;
        }
        clipped.cells += row.iter_mut().map(clip_cell).filter(|&cut| cut).count();
    }
    clipped
}

/// One named sheet. The first row is the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    name: String,
    pub(crate) rows: Vec<Vec<String>>,
}

impl SheetEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(|c| c.is_empty()))
    }
}

#[derive(Debug, Default)]
pub struct Workbook {
    sheets: Vec<SheetEntry>,
    namer: SheetNamer,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet, returning the name it was given.
    ///
    /// Rows beyond the worksheet limits are clipped.
    pub fn add_sheet(&mut self, name: &str, mut rows: Vec<Vec<String>>) -> &str {
        let name = self.namer.claim(name);
        let clipped = fit_to_sheet(&mut rows);
        if !clipped.is_empty() {
            warn!("Sheet '{name}': {clipped}");
        }
        self.sheets.push(SheetEntry { name, rows });
        &self.sheets[self.sheets.len() - 1].name
    }

    /// Add the `EMPTY` placeholder sheet if no sheet exists yet.
    ///
    /// Returns whether the placeholder was added.
    pub fn ensure_not_empty(&mut self) -> bool {
        if !self.sheets.is_empty() {
            return false;
        }
        self.add_sheet(EMPTY_SHEET, vec![vec![NO_READABLE_DATA.to_string()]]);
        true
    }

    pub fn sheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    pub(crate) fn sheets_mut(&mut self) -> &mut [SheetEntry] {
        &mut self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetEntry> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
