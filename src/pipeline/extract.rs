//! Page extractor: classify engine regions into typed blocks.
//!
//! This is the only place where engine output is inspected. Everything
//! downstream works on [`Block`] and never re-examines region labels or
//! markup.

use crate::engine::{DetectedRegion, SharedEngine};
use crate::error::{EngineError, ExtractionError};
use crate::pipeline::html_table::parse_tables;
use crate::pipeline::source::Page;
use std::collections::HashSet;
use std::time::Duration;
use crate::workbook::{clip_cell, fit_to_sheet, Clipped};
use tracing::{debug, warn};

/// A structurally classified region of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Tabular content. `rows[0]` is the header row; captions are unique and
    /// non-empty. Data rows may be shorter or longer than the header.
    Table { rows: Vec<Vec<String>> },
    /// Free text, one entry per line.
    TextRegion { lines: Vec<String> },
}

/// Run structural analysis on one page.
///
/// Engine failures and timeouts come back as `Err`; the caller decides what
/// degraded content replaces the page.
pub async fn extract(
    engine: &SharedEngine,
    page: &Page,
    timeout: Option<Duration>,
) -> Result<Vec<Block>, ExtractionError> {
    let regions = engine
        .detect(page, timeout)
        .await
        .map_err(|source| match source {
            EngineError::TimedOut { secs } => ExtractionError::Timeout {
                file: page.file_index + 1,
                page: page.page_index + 1,
                secs,
            },
            source => ExtractionError::Engine {
                file: page.file_index + 1,
                page: page.page_index + 1,
                source,
            },
        })?;

    let mut blocks = classify(regions);
    let clipped = fit_blocks(&mut blocks);
    if !clipped.is_empty() {
        warn!("{}: {clipped}", page.label());
    }
    debug!("{}: {} blocks", page.label(), blocks.len());
    Ok(blocks)
}

/// Clip every block to what a worksheet can hold.
fn fit_blocks(blocks: &mut [Block]) -> Clipped {
    let mut clipped = Clipped::default();
    for block in blocks {
        match block {
            Block::Table { rows } => clipped += fit_to_sheet(rows),
            Block::TextRegion { lines } => {
                clipped.cells += lines.iter_mut().map(clip_cell).filter(|&cut| cut).count();
            }
        }
    }
    clipped
}

/// Turn engine regions into blocks, keeping engine order.
///
/// A table region yields one Table per `<table>` in its markup. A table
/// region without usable markup, and every other region, becomes a
/// TextRegion carrying its non-blank lines; regions without text vanish.
pub fn classify(regions: Vec<DetectedRegion>) -> Vec<Block> {
    let mut blocks = Vec::new();

    for region in regions {
        if region.is_table() {
            let tables = region.html.as_deref().map(parse_tables).unwrap_or_default();
            if !tables.is_empty() {
                for table in tables {
                    let width = table.width();
                    let header = table
                        .header
                        .unwrap_or_else(|| (0..width).map(|i| i.to_string()).collect());
                    let mut rows = Vec::with_capacity(table.rows.len() + 1);
                    rows.push(normalize_header(header, width));
                    rows.extend(table.rows);
                    blocks.push(Block::Table { rows });
                }
                continue;
            }
        }

        let lines: Vec<String> = region
            .lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if !lines.is_empty() {
            blocks.push(Block::TextRegion { lines });
        }
    }

    blocks
}

/// Make header captions usable as column names.
///
/// The header is padded to `width`; blank captions become `Unnamed: <i>` and
/// repeats get a `.<k>` suffix (`Qty`, `Qty.1`, `Qty.2`). Repeats are found
/// ignoring case, as spreadsheet table columns are.
pub fn normalize_header(mut header: Vec<String>, width: usize) -> Vec<String> {
    if header.len() < width {
        header.resize(width, String::new());
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(header.len());
    header
        .into_iter()
        .enumerate()
        .map(|(i, caption)| {
            let base = match caption.trim() {
                "" => format!("Unnamed: {i}"),
                text => text.to_string(),
            };
            let mut name = base.clone();
            let mut k = 1;
            while !seen.insert(name.to_lowercase()) {
                name = format!("{base}.{k}");
                k += 1;
            }
            name
        })
        .collect()
}
