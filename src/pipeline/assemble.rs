//! Workbook assembler.
//!
//! Drives one file through page source → extractor → (fallback) and turns
//! the blocks into draft sheets according to the job's mode:
//!
//! * **Standard**: every table of the file's first pages is concatenated into
//!   a single `File_<n>` sheet. A file without table data gets OCR fallback
//!   text instead, so each input file yields exactly one sheet.
//! * **Advanced**: every table on every page gets its own
//!   `F<f>_P<p>_T<k>` sheet; a page's free text is collected into one
//!   `F<f>_P<p>_TEXT` sheet.
//!
//! Decode and extraction failures never escape this module. They are logged
//! with file/page context, reported to the progress callback and counted in
//! the stats; the affected unit simply contributes nothing.

use crate::config::{ConversionConfig, ConversionMode};
use crate::engine::SharedEngine;
use crate::job::StagedFile;
use crate::output::ConversionStats;
use crate::pipeline::extract::{extract, normalize_header, Block};
use crate::pipeline::fallback::{fallback_rows, fallback_text};
use crate::pipeline::naming::{standard_name, table_name, text_name};
use crate::pipeline::source::pages;
use crate::workbook::Workbook;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Header cell of an advanced-mode text sheet.
pub const DETECTED_TEXT_HEADER: &str = "Detected Text";

/// A sheet before it has been given its final, unique name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Everything one file contributes to the workbook.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// 0-based position of the file in the job.
    pub file_index: usize,
    pub sheets: Vec<DraftSheet>,
    pub stats: ConversionStats,
}

/// Shared, read-only state of a job's pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    pub engine: &'a SharedEngine,
    pub config: &'a ConversionConfig,
    pub mode: ConversionMode,
    pub total_files: usize,
}

impl Pipeline<'_> {
    fn timeout(&self) -> Option<Duration> {
        self.config.page_timeout_secs.map(Duration::from_secs)
    }

    fn unit_error(&self, file_num: usize, page_num: Option<usize>, error: &str) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_unit_error(file_num, page_num, error);
        }
    }

    /// Process one staged file.
    pub async fn process_file(&self, file: &StagedFile, file_index: usize) -> FileOutcome {
        let file_num = file_index + 1;
        info!(
            "Processing file {}/{} ({}): '{}'",
            file_num, self.total_files, self.mode, file.original_name
        );

        let mut stats = ConversionStats {
            files: 1,
            ..Default::default()
        };

        // ── Extract every page ───────────────────────────────────────────
        let mut page_blocks: Vec<(usize, Vec<Block>)> = Vec::new();
        let mut stream = pages(
            file,
            file_index,
            self.config.max_pages(self.mode),
            self.config.max_rendered_pixels,
        );

        while let Some(item) = stream.next().await {
            let page = match item {
                Ok(page) => page,
                Err(e) => {
                    warn!("File {file_num}: {e}");
                    stats.degraded_units += 1;
                    self.unit_error(file_num, None, &e.to_string());
                    break;
                }
            };
            stats.pages += 1;
            let page_num = page.page_index + 1;

            match extract(self.engine, &page, self.timeout()).await {
                Ok(blocks) => {
                    for block in &blocks {
                        match block {
                            Block::Table { .. } => stats.tables += 1,
                            Block::TextRegion { .. } => stats.text_regions += 1,
                        }
                    }
                    if let Some(ref cb) = self.config.progress_callback {
                        cb.on_page_extracted(file_num, page_num, blocks.len());
                    }
                    page_blocks.push((page_num, blocks));
                }
                Err(e) => {
                    warn!("Extraction failed, page skipped: {e}");
                    stats.degraded_units += 1;
                    self.unit_error(file_num, Some(page_num), &e.to_string());
                }
            }
        }

        // ── Emit sheets ──────────────────────────────────────────────────
        let sheets = match self.mode {
            ConversionMode::Standard => {
                let tables = page_blocks
                    .into_iter()
                    .flat_map(|(_, blocks)| blocks)
                    .filter_map(|block| match block {
                        Block::Table { rows } => Some(rows),
                        Block::TextRegion { .. } => None,
                    })
                    .collect();

                let rows = match concat_tables(tables) {
                    Some(rows) => rows,
                    None => {
                        let lines = fallback_text(
                            self.engine,
                            file,
                            file_index,
                            self.config.max_rendered_pixels,
                            self.timeout(),
                        )
                        .await;
                        info!("File {file_num}: no table data, {} OCR lines", lines.len());
                        stats.fallback_files += 1;
                        if let Some(ref cb) = self.config.progress_callback {
                            cb.on_fallback(file_num, lines.len());
                        }
                        fallback_rows(lines)
                    }
                };

                vec![DraftSheet {
                    name: standard_name(file_num),
                    rows,
                }]
            }
            ConversionMode::Advanced => page_blocks
                .into_iter()
                .flat_map(|(page_num, blocks)| page_sheets(file_num, page_num, blocks))
                .collect(),
        };

        debug!("File {file_num}: {} sheets", sheets.len());
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_file_complete(file_num, self.total_files);
        }

        FileOutcome {
            file_index,
            sheets,
            stats,
        }
    }
}

/// Advanced-mode sheets of one page: tables first, then the page text.
pub fn page_sheets(file_num: usize, page_num: usize, blocks: Vec<Block>) -> Vec<DraftSheet> {
    let mut sheets = Vec::new();
    let mut text_rows = Vec::new();
    let mut table_num = 0;

    for block in blocks {
        match block {
            Block::Table { rows } => {
                table_num += 1;
                sheets.push(DraftSheet {
                    name: table_name(file_num, page_num, table_num),
                    rows,
                });
            }
            Block::TextRegion { lines } => {
                text_rows.extend(lines.into_iter().map(|line| vec![line]));
            }
        }
    }

    if !text_rows.is_empty() {
        let mut rows = Vec::with_capacity(text_rows.len() + 1);
        rows.push(vec![DETECTED_TEXT_HEADER.to_string()]);
        rows.extend(text_rows);
        sheets.push(DraftSheet {
            name: text_name(file_num, page_num),
            rows,
        });
    }

    sheets
}

/// Concatenate tables positionally under the first table's header.
///
/// A later table's header row is kept as a data row unless it repeats the
/// first header or is a plain column ordinal header. Rows shorter than the
/// widest row are padded with blanks; header slots beyond the first header
/// become `Unnamed: <i>`, deduplicated like any other caption. Returns
/// `None` when there are no data rows.
pub fn concat_tables(tables: Vec<Vec<Vec<String>>>) -> Option<Vec<Vec<String>>> {
    let mut tables = tables.into_iter().filter(|t| !t.is_empty());
    let mut first = tables.next()?;
    let header = first.remove(0);
    let mut body = first;

    for mut table in tables {
        let other_header = table.remove(0);
        if other_header != header && !is_ordinal_header(&other_header) {
            body.push(other_header);
        }
        body.extend(table);
    }

    if body.is_empty() {
        return None;
    }

    let width = body
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0)
        .max(header.len());

    let header = normalize_header(header, width);

    let mut rows = Vec::with_capacity(body.len() + 1);
    rows.push(header);
    for mut row in body {
        row.resize(width, String::new());
        rows.push(row);
    }
    Some(rows)
}

fn is_ordinal_header(header: &[String]) -> bool {
    header.iter().enumerate().all(|(i, c)| *c == i.to_string())
}

/// Merge per-file outcomes into a workbook in file order.
///
/// Sheet names are made unique on insertion. When no file contributed a
/// sheet, the `EMPTY` placeholder is added.
pub fn assemble(mut outcomes: Vec<FileOutcome>) -> (Workbook, ConversionStats) {
    outcomes.sort_by_key(|o| o.file_index);

    let mut workbook = Workbook::new();
    let mut stats = ConversionStats::default();
    for outcome in outcomes {
        stats.absorb(&outcome.stats);
        for sheet in outcome.sheets {
            workbook.add_sheet(&sheet.name, sheet.rows);
        }
    }

    if workbook.ensure_not_empty() {
        info!("No readable data detected; wrote placeholder sheet");
    }
    stats.sheets = workbook.len();
    (workbook, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn lines(data: &[&str]) -> Vec<String> {
        data.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn concat_pads_ragged_rows_and_widens_header() {
        let merged = concat_tables(vec![
            rows(&[&["Item", "Qty"], &["Pen", "2"]]),
            rows(&[&["Item", "Qty"], &["Ink", "1", "blue"], &["Pad"]]),
        ])
        .unwrap();
        assert_eq!(
            merged,
            rows(&[
                &["Item", "Qty", "Unnamed: 2"],
                &["Pen", "2", ""],
                &["Ink", "1", "blue"],
                &["Pad", "", ""],
            ])
        );
    }

    #[test]
    fn concat_widening_does_not_collide_with_existing_captions() {
        let merged = concat_tables(vec![rows(&[&["unnamed: 1"], &["a", "b"]])]).unwrap();
        assert_eq!(merged[0], lines(&["unnamed: 1", "Unnamed: 1.1"]));
    }

    #[test]
    fn concat_keeps_a_different_later_header_as_data() {
        let merged = concat_tables(vec![
            rows(&[&["Item", "Qty"], &["Pen", "2"]]),
            rows(&[&["Name", "Age"], &["Ada", "36"]]),
            rows(&[&["0", "1"], &["x", "y"]]),
        ])
        .unwrap();
        assert_eq!(
            merged,
            rows(&[
                &["Item", "Qty"],
                &["Pen", "2"],
                &["Name", "Age"],
                &["Ada", "36"],
                &["x", "y"],
            ])
        );
    }

    #[test]
    fn concat_without_data_is_none() {
        assert_eq!(concat_tables(vec![]), None);
        assert_eq!(concat_tables(vec![rows(&[&["A", "B"]])]), None);
    }

    #[test]
    fn page_sheets_number_tables_and_merge_text() {
        let sheets = page_sheets(
            2,
            3,
            vec![
                Block::TextRegion {
                    lines: lines(&["Invoice"]),
                },
                Block::Table {
                    rows: rows(&[&["A"], &["1"]]),
                },
                Block::TextRegion {
                    lines: lines(&["Total", "42"]),
                },
                Block::Table {
                    rows: rows(&[&["B"], &["2"]]),
                },
            ],
        );
        let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["F2_P3_T1", "F2_P3_T2", "F2_P3_TEXT"]);
        assert_eq!(
            sheets[2].rows,
            rows(&[&["Detected Text"], &["Invoice"], &["Total"], &["42"]])
        );
    }

    #[test]
    fn page_without_blocks_has_no_sheets() {
        assert!(page_sheets(1, 1, vec![]).is_empty());
    }

    #[test]
    fn assemble_orders_by_file_and_adds_placeholder_only_when_empty() {
        let outcome = |file_index: usize, name: &str| FileOutcome {
            file_index,
            sheets: vec![DraftSheet {
                name: name.to_string(),
                rows: rows(&[&["x"]]),
            }],
            stats: ConversionStats {
                files: 1,
                ..Default::default()
            },
        };
        let (wb, stats) = assemble(vec![outcome(1, "File_2"), outcome(0, "File_1")]);
        assert_eq!(wb.sheet_names(), vec!["File_1", "File_2"]);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.sheets, 2);

        let empty = FileOutcome {
            file_index: 0,
            sheets: vec![],
            stats: ConversionStats::default(),
        };
        let (wb, stats) = assemble(vec![empty]);
        assert_eq!(wb.sheet_names(), vec!["EMPTY"]);
        assert_eq!(
            wb.sheets()[0].rows(),
            &rows(&[&["No readable data detected"]])[..]
        );
        assert_eq!(stats.sheets, 1);
    }
}
