//! Error types for the edgequake-doc2sheet library.
//!
//! Two families of errors reflect two distinct failure modes:
//!
//! * [`Doc2SheetError`] is **fatal**: the request cannot be served at all
//!   (no files uploaded, output cannot be written, unknown download id).
//!   Returned as `Err(Doc2SheetError)` from the [`crate::convert::Converter`]
//!   entry points.
//!
//! * [`DecodeError`], [`ExtractionError`], [`EngineError`] are **non-fatal**: a
//!   single file or page could not be read or analysed. The assembler absorbs
//!   them locally (logging file/page context) and substitutes fallback or
//!   placeholder content, so a job with a non-empty file list always succeeds.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doc2sheet library.
#[derive(Debug, Error)]
pub enum Doc2SheetError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request carried no files; no job is created.
    #[error("No files uploaded")]
    NoFiles,

    /// The download id does not resolve to a saved workbook.
    #[error("File not found: '{file_id}'")]
    OutputNotFound { file_id: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// An uploaded file could not be written to the staging directory.
    #[error("Failed to stage upload '{path}': {source}")]
    StagingFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The workbook could not be serialised or written.
    #[error("Failed to write workbook '{path}': {detail}")]
    OutputWriteFailed { path: PathBuf, detail: String },

    /// A saved workbook exists but could not be read back.
    #[error("Failed to read workbook '{path}': {source}")]
    OutputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The vision provider backing the layout engine is not initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Doc2SheetError {
    /// HTTP-equivalent status code for callers that expose the converter
    /// over a web API.
    pub fn http_status(&self) -> u16 {
        match self {
            Doc2SheetError::NoFiles | Doc2SheetError::InvalidConfig(_) => 400,
            Doc2SheetError::OutputNotFound { .. } => 404,
            _ => 500,
        }
    }
}

/// A file could not be turned into pages.
///
/// Treated by the pipeline as "zero pages" for that file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The staged file could not be opened or read.
    #[error("cannot read '{path}': {detail}")]
    Unreadable { path: PathBuf, detail: String },

    /// The image codec rejected the file (corrupt or unsupported format).
    #[error("cannot decode image '{path}': {detail}")]
    Image { path: PathBuf, detail: String },

    /// pdfium could not bind, open the document, or render a page.
    #[error("cannot decode PDF '{path}': {detail}")]
    Pdf { path: PathBuf, detail: String },
}

/// A failure reported by a [`crate::engine::LayoutEngine`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine failed outright (model crash, provider error, I/O).
    #[error("engine failure: {0}")]
    Failed(String),

    /// The engine answered but the answer could not be understood.
    #[error("malformed engine response: {0}")]
    MalformedResponse(String),

    /// The call did not finish within the caller's time limit.
    #[error("engine call timed out after {secs}s")]
    TimedOut { secs: u64 },
}

/// Structural extraction failed for one page.
///
/// Treated by the assembler as "no blocks for this page".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The layout engine returned an error for this page.
    #[error("file {file}, page {page}: {source}")]
    Engine {
        file: usize,
        page: usize,
        #[source]
        source: EngineError,
    },

    /// The layout engine did not answer within the configured timeout.
    #[error("file {file}, page {page}: extraction timed out after {secs}s")]
    Timeout { file: usize, page: usize, secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_files_maps_to_bad_request() {
        let e = Doc2SheetError::NoFiles;
        assert_eq!(e.http_status(), 400);
        assert_eq!(e.to_string(), "No files uploaded");
    }

    #[test]
    fn unknown_output_maps_to_not_found() {
        let e = Doc2SheetError::OutputNotFound {
            file_id: "ADV_123".into(),
        };
        assert_eq!(e.http_status(), 404);
        assert!(e.to_string().contains("ADV_123"));
    }

    #[test]
    fn write_failure_is_server_error() {
        let e = Doc2SheetError::OutputWriteFailed {
            path: PathBuf::from("outputs/x.xlsx"),
            detail: "disk full".into(),
        };
        assert_eq!(e.http_status(), 500);
        assert!(e.to_string().contains("disk full"));
    }

    #[test]
    fn extraction_error_carries_location() {
        let e = ExtractionError::Engine {
            file: 2,
            page: 3,
            source: EngineError::Failed("boom".into()),
        };
        let msg = e.to_string();
        assert!(msg.contains("file 2"), "got: {msg}");
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(msg.contains("boom"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = ExtractionError::Timeout {
            file: 1,
            page: 1,
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }
}
