//! # edgequake-doc2sheet
//!
//! Convert scanned documents, photos and PDFs into formatted Excel
//! workbooks.
//!
//! Each page is handed to a layout engine that finds tables and text
//! regions. Tables become sheets; pages without tables fall back to plain
//! OCR text, so every job produces a usable workbook even from poor scans.
//!
//! ## Pipeline Overview
//!
//! ```text
//! uploads
//!  │
//!  ├─ 1. Stage     write files under <jobId>_<name>
//!  ├─ 2. Source    image → 1 page, PDF → pages via pdfium (spawn_blocking)
//!  ├─ 3. Extract   layout engine → Table | TextRegion blocks
//!  ├─ 4. Fallback  whole-page OCR when a file has no table data
//!  ├─ 5. Assemble  sheets per mode, unique names, never empty
//!  ├─ 6. Format    bold header, borders, widths, table range, frozen header
//!  └─ 7. Save      atomic .xlsx write, file id returned
//! ```
//!
//! ## Modes
//!
//! | Mode | Sheets | Pages |
//! |------|--------|-------|
//! | `standard` | `File_<n>`, one per file | first 2 pages of a PDF |
//! | `advanced` | `F<f>_P<p>_T<k>` per table, `F<f>_P<p>_TEXT` per page | all pages |
//!
//! [`route_task`] picks a mode from a free-text task description.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2sheet::{ConversionConfig, Converter, Upload};
//! use edgequake_doc2sheet::engine::vision::VisionEngineConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let converter = Converter::with_vision_engine(
//!         ConversionConfig::default(),
//!         VisionEngineConfig::default(),
//!     )?;
//!     let upload = Upload::new("scan.pdf", std::fs::read("scan.pdf")?);
//!     let reply = converter.convert_advanced(vec![upload]).await?;
//!     println!("saved as {}", reply.file_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2sheet` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-doc2sheet = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod router;
pub mod workbook;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ConversionMode};
pub use convert::Converter;
pub use engine::{DetectedRegion, LayoutEngine, SharedEngine, TextLine};
pub use error::{DecodeError, Doc2SheetError, EngineError, ExtractionError};
pub use job::{JobId, StagedFile, Upload};
pub use output::{AdvancedResponse, ConversionOutput, ConversionStats, Download, StandardResponse};
pub use pipeline::extract::Block;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use router::{route_task, RouteDecision};
pub use workbook::{SheetEntry, Workbook};
