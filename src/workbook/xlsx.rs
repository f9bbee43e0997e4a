//! xlsx output via rust_xlsxwriter.
//!
//! The workbook is serialised to memory, written to a temporary file in the
//! output directory and renamed into place, so a reader never sees a
//! half-written workbook.

use crate::error::Doc2SheetError;
use crate::workbook::format::{apply, SheetLayout, SheetStyler};
use crate::workbook::Workbook;
use rust_xlsxwriter::{
    Format, FormatAlign, FormatBorder, Table, TableColumn, TableStyle, Workbook as XlsxWorkbook,
    Worksheet, XlsxError,
};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// [`SheetStyler`] over one rust_xlsxwriter worksheet.
pub struct XlsxStyler<'a> {
    sheet: &'a mut Worksheet,
    header: Format,
    body: Format,
}

impl<'a> XlsxStyler<'a> {
    pub fn new(sheet: &'a mut Worksheet) -> Self {
        Self {
            sheet,
            header: Format::new()
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_border(FormatBorder::Thin),
            body: Format::new().set_border(FormatBorder::Thin),
        }
    }
}

impl SheetStyler for XlsxStyler<'_> {
    type Error = XlsxError;

    fn style_header(&mut self, header: &[String]) -> Result<(), XlsxError> {
        for (col, text) in header.iter().enumerate() {
            self.sheet
                .write_string_with_format(0, col as u16, text, &self.header)?;
        }
        Ok(())
    }

    fn set_borders(&mut self, rows: &[Vec<String>], width: usize) -> Result<(), XlsxError> {
        for (r, row) in rows.iter().enumerate() {
            let row_num = r as u32 + 1;
            for col in 0..width.max(row.len()) {
                match row.get(col) {
                    Some(text) if !text.is_empty() => {
                        self.sheet
                            .write_string_with_format(row_num, col as u16, text, &self.body)?;
                    }
                    _ => {
                        self.sheet.write_blank(row_num, col as u16, &self.body)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn auto_width(&mut self, widths: &[f64]) -> Result<(), XlsxError> {
        for (col, width) in widths.iter().enumerate() {
            self.sheet.set_column_width(col as u16, *width)?;
        }
        Ok(())
    }

    fn register_table(
        &mut self,
        name: &str,
        captions: &[String],
        last_row: u32,
    ) -> Result<(), XlsxError> {
        if captions.is_empty() {
            return Ok(());
        }
        let columns: Vec<TableColumn> = captions
            .iter()
            .map(|c| {
                TableColumn::new()
                    .set_header(c)
                    .set_header_format(&self.header)
            })
            .collect();
        let table = Table::new()
            .set_name(name)
            .set_style(TableStyle::Medium9)
            .set_banded_rows(true)
            .set_columns(&columns);
        self.sheet
            .add_table(0, 0, last_row, (captions.len() - 1) as u16, &table)?;
        Ok(())
    }

    fn freeze_header(&mut self) -> Result<(), XlsxError> {
        self.sheet.set_freeze_panes(1, 0)?;
        Ok(())
    }
}

/// Render `workbook` with its layouts into xlsx bytes.
pub fn to_bytes(workbook: &Workbook, layouts: &[SheetLayout]) -> Result<Vec<u8>, XlsxError> {
    let mut book = XlsxWorkbook::new();
    for (sheet, layout) in workbook.sheets().iter().zip(layouts) {
        let worksheet = book.add_worksheet();
        worksheet.set_name(sheet.name())?;
        apply(&mut XlsxStyler::new(worksheet), sheet, layout)?;
    }
    book.save_to_buffer()
}

/// Serialise `workbook` and atomically place it at `path`.
///
/// Blocking; call from `spawn_blocking` in async contexts.
pub fn save(workbook: &Workbook, layouts: &[SheetLayout], path: &Path) -> Result<(), Doc2SheetError> {
    let write_failed = |detail: String| Doc2SheetError::OutputWriteFailed {
        path: path.to_path_buf(),
        detail,
    };

    let bytes = to_bytes(workbook, layouts).map_err(|e| write_failed(e.to_string()))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| write_failed(e.to_string()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_failed(e.to_string()))?;
    tmp.write_all(&bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| write_failed(e.to_string()))?;
    tmp.persist(path)
        .map_err(|e| write_failed(e.error.to_string()))?;

    debug!(
        "Saved {} sheets ({} bytes) to {}",
        workbook.len(),
        bytes.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::format::format_workbook;
    use calamine::{open_workbook, Data, Reader, Xlsx};

    fn cell_text(cell: &Data) -> String {
        match cell {
            Data::String(s) => s.clone(),
            Data::Empty => String::new(),
            other => other.to_string(),
        }
    }

    #[test]
    fn saved_workbook_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("job.xlsx");

        let mut wb = Workbook::new();
        wb.add_sheet(
            "File_1",
            vec![
                vec!["Item".into(), "Qty".into()],
                vec!["Pen".into()],
                vec!["Ink".into(), "3".into()],
            ],
        );
        wb.add_sheet("File_2", vec![vec!["Extracted Text".into()]]);
        let layouts = format_workbook(&mut wb);
        save(&wb, &layouts, &path).unwrap();

        let mut book: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(book.sheet_names(), vec!["File_1", "File_2"]);

        let range = book.worksheet_range("File_1").unwrap();
        let grid: Vec<Vec<String>> = range
            .rows()
            .map(|r| r.iter().map(cell_text).collect())
            .collect();
        assert_eq!(
            grid,
            vec![
                vec!["Item", "Qty"],
                vec!["Pen", ""],
                vec!["Ink", "3"],
            ]
        );
    }

    #[test]
    fn failed_save_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let path = blocker.join("job.xlsx");

        let mut wb = Workbook::new();
        wb.ensure_not_empty();
        let layouts = format_workbook(&mut wb);
        let err = save(&wb, &layouts, &path).unwrap_err();
        assert!(matches!(err, Doc2SheetError::OutputWriteFailed { .. }));
        assert!(!path.exists());
    }
}
