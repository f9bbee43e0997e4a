//! Fallback text extraction for files where no table was found.
//!
//! Runs the engine's whole-page OCR (not the structural path) on the file's
//! first page and returns the recognised lines. Any failure on the way is
//! logged and yields no lines; the caller still emits a sheet.

use crate::engine::SharedEngine;
use crate::job::StagedFile;
use crate::pipeline::source::first_page;
use crate::workbook::{clip_cell, MAX_CELL_CHARS};
use std::time::Duration;
use tracing::{debug, warn};

/// Header cell of a fallback sheet.
pub const FALLBACK_HEADER: &str = "Extracted Text";

/// Single data cell of a fallback sheet when OCR found nothing.
pub const NO_TEXT: &str = "No text";

/// OCR the first page of `file`.
///
/// Blank lines are dropped. Decode errors, engine errors and timeouts all
/// produce an empty list.
pub async fn fallback_text(
    engine: &SharedEngine,
    file: &StagedFile,
    file_index: usize,
    max_pixels: u32,
    timeout: Option<Duration>,
) -> Vec<String> {
    let page = match first_page(file, file_index, max_pixels).await {
        Ok(Some(page)) => page,
        Ok(None) => {
            debug!("Fallback: '{}' has no pages", file.original_name);
            return Vec::new();
        }
        Err(e) => {
            warn!("Fallback: {e}");
            return Vec::new();
        }
    };

    let outcome = engine.recognize_text(&page, timeout).await;

    match outcome {
        Ok(lines) => {
            let mut truncated = 0;
            let lines: Vec<String> = lines
                .into_iter()
                .map(|l| l.text.trim().to_string())
                .filter(|t| !t.is_empty())
                .map(|mut t| {
                    if clip_cell(&mut t) {
                        truncated += 1;
                    }
                    t
                })
                .collect();
            if truncated > 0 {
                warn!(
                    "Fallback OCR for {}: {truncated} line(s) truncated to {MAX_CELL_CHARS} chars",
                    page.label()
                );
            }
            lines
        }
        Err(e) => {
            warn!("Fallback OCR for {} failed: {e}", page.label());
            Vec::new()
        }
    }
}

/// Sheet rows for fallback output: the header, then one row per line, or a
/// single `No text` row when there are no lines.
pub fn fallback_rows(lines: Vec<String>) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(lines.len().max(1) + 1);
    rows.push(vec![FALLBACK_HEADER.to_string()]);
    if lines.is_empty() {
        rows.push(vec![NO_TEXT.to_string()]);
    } else {
        rows.extend(lines.into_iter().map(|l| vec![l]));
    }
    rows
}
