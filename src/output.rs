//! Output types returned by the converter.

use crate::config::ConversionMode;
use crate::job::JobId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// MIME type of an xlsx workbook.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Message attached to every advanced-mode response.
pub const ADVANCED_DONE_MESSAGE: &str = "Advanced multi-page, multi-table conversion completed";

/// Complete result of one conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub job_id: JobId,
    pub mode: ConversionMode,
    /// Download handle: `<jobId>` or `ADV_<jobId>`.
    pub file_id: String,
    /// Where the workbook was saved.
    pub path: PathBuf,
    /// Sheet names in workbook order.
    pub sheet_names: Vec<String>,
    pub stats: ConversionStats,
}

/// Counters for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub files: usize,
    /// Pages decoded and handed to the extractor.
    pub pages: usize,
    /// Table blocks extracted across all pages.
    pub tables: usize,
    /// Text regions extracted across all pages.
    pub text_regions: usize,
    /// Files that ended up with OCR fallback text (standard mode).
    pub fallback_files: usize,
    /// Files or pages that failed to decode or extract.
    pub degraded_units: usize,
    pub sheets: usize,
    pub duration_ms: u64,
}

impl ConversionStats {
    pub(crate) fn absorb(&mut self, other: &ConversionStats) {
        self.files += other.files;
        self.pages += other.pages;
        self.tables += other.tables;
        self.text_regions += other.text_regions;
        self.fallback_files += other.fallback_files;
        self.degraded_units += other.degraded_units;
    }
}

/// Reply of a standard conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardResponse {
    pub status: String,
    pub file_id: String,
}

/// Reply of an advanced conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedResponse {
    pub status: String,
    pub message: String,
    pub file_id: String,
}

impl From<&ConversionOutput> for StandardResponse {
    fn from(output: &ConversionOutput) -> Self {
        Self {
            status: "success".to_string(),
            file_id: output.file_id.clone(),
        }
    }
}

impl From<&ConversionOutput> for AdvancedResponse {
    fn from(output: &ConversionOutput) -> Self {
        Self {
            status: "success".to_string(),
            message: ADVANCED_DONE_MESSAGE.to_string(),
            file_id: output.file_id.clone(),
        }
    }
}

/// A saved workbook ready to hand to a client.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    /// Display filename, independent of the job id.
    pub filename: String,
    pub content_type: &'static str,
}
