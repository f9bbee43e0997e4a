//! Configuration types for document-to-workbook conversion.
//!
//! All pipeline behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The layout engine itself is not part
//! of the config: it is a process-wide resource injected into
//! [`crate::convert::Converter`] alongside it.

use crate::error::Doc2SheetError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for a conversion service.
///
/// # Example
/// ```rust
/// use edgequake_doc2sheet::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .upload_dir("/var/lib/doc2sheet/uploads")
///     .output_dir("/var/lib/doc2sheet/outputs")
///     .concurrency(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.standard_max_pages, 2);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory where uploaded files are staged. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Directory where finished workbooks are saved. Default: `outputs`.
    pub output_dir: PathBuf,

    /// PDF pages analysed per file in standard mode. Default: 2.
    ///
    /// Standard mode is the latency-bounded path: a long PDF is judged by its
    /// first pages only.
    pub standard_max_pages: usize,

    /// PDF pages analysed per file in advanced mode. Default: all.
    pub advanced_max_pages: Option<usize>,

    /// Longest edge of a rendered PDF page in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Files processed concurrently within one job. Default: 4.
    pub concurrency: usize,

    /// Per-page extraction timeout in seconds. Default: none.
    ///
    /// When set, a page whose engine call takes longer degrades exactly like
    /// a failed page.
    pub page_timeout_secs: Option<u64>,

    /// Display filename attached to downloads. Default: `Converted.xlsx`.
    pub download_filename: String,

    /// Receives job, file and page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            standard_max_pages: 2,
            advanced_max_pages: None,
            max_rendered_pixels: 2000,
            concurrency: 4,
            page_timeout_secs: None,
            download_filename: "Converted.xlsx".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("upload_dir", &self.upload_dir)
            .field("output_dir", &self.output_dir)
            .field("standard_max_pages", &self.standard_max_pages)
            .field("advanced_max_pages", &self.advanced_max_pages)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("download_filename", &self.download_filename)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Page cap applied to PDFs in the given mode.
    pub fn max_pages(&self, mode: ConversionMode) -> Option<usize> {
        match mode {
            ConversionMode::Standard => Some(self.standard_max_pages),
            ConversionMode::Advanced => self.advanced_max_pages,
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn standard_max_pages(mut self, n: usize) -> Self {
        self.config.standard_max_pages = n;
        self
    }

    pub fn advanced_max_pages(mut self, n: Option<usize>) -> Self {
        self.config.advanced_max_pages = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = Some(secs);
        self
    }

    pub fn download_filename(mut self, name: impl Into<String>) -> Self {
        self.config.download_filename = name.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Doc2SheetError> {
        let c = &self.config;
        if c.standard_max_pages == 0 {
            return Err(Doc2SheetError::InvalidConfig(
                "standard_max_pages must be ≥ 1".into(),
            ));
        }
        if c.advanced_max_pages == Some(0) {
            return Err(Doc2SheetError::InvalidConfig(
                "advanced_max_pages must be ≥ 1 when set".into(),
            ));
        }
        if c.page_timeout_secs == Some(0) {
            return Err(Doc2SheetError::InvalidConfig(
                "page_timeout_secs must be ≥ 1 when set".into(),
            ));
        }
        if c.download_filename.trim().is_empty() {
            return Err(Doc2SheetError::InvalidConfig(
                "download_filename must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Decomposition strategy for a conversion job.
///
/// | Mode | Sheets | Pages analysed |
/// |------|--------|----------------|
/// | Standard | one per file, tables concatenated, OCR fallback | first 2 PDF pages |
/// | Advanced | one per table plus one per page of free text | every page |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    #[default]
    Standard,
    Advanced,
}

impl ConversionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionMode::Standard => "standard",
            ConversionMode::Advanced => "advanced",
        }
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
