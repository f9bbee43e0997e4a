//! Progress-callback trait for per-file and per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through a job.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2sheet::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_extracted(&self, file_num: usize, page_num: usize, blocks: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("file {file_num} page {page_num}: {blocks} blocks");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     pages: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it processes each file and page.
///
/// Files of one job may be processed concurrently, so the per-file and
/// per-page methods can be called from several tasks at once. All methods
/// have default no-op implementations.
///
/// File and page numbers are 1-indexed.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after staging, before any file is decoded.
    fn on_job_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when structural extraction of a page succeeded.
    fn on_page_extracted(&self, file_num: usize, page_num: usize, blocks: usize) {
        let _ = (file_num, page_num, blocks);
    }

    /// Called when a page or file degraded (decode error, engine error,
    /// timeout). The job continues.
    fn on_unit_error(&self, file_num: usize, page_num: Option<usize>, error: &str) {
        let _ = (file_num, page_num, error);
    }

    /// Called when a file fell back to whole-page OCR text.
    fn on_fallback(&self, file_num: usize, lines: usize) {
        let _ = (file_num, lines);
    }

    /// Called when every page of a file has been attempted.
    fn on_file_complete(&self, file_num: usize, total_files: usize) {
        let _ = (file_num, total_files);
    }

    /// Called once after the workbook has been saved.
    fn on_job_complete(&self, total_files: usize, sheets: usize) {
        let _ = (total_files, sheets);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        pages: AtomicUsize,
        errors: AtomicUsize,
        fallbacks: AtomicUsize,
        sheets: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_page_extracted(&self, _file_num: usize, _page_num: usize, _blocks: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_error(&self, _file_num: usize, _page_num: Option<usize>, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_fallback(&self, _file_num: usize, _lines: usize) {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_complete(&self, _total_files: usize, sheets: usize) {
            self.sheets.store(sheets, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_start(2);
        cb.on_page_extracted(1, 1, 3);
        cb.on_unit_error(2, None, "corrupt");
        cb.on_fallback(2, 0);
        cb.on_file_complete(2, 2);
        cb.on_job_complete(2, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            pages: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            fallbacks: AtomicUsize::new(0),
            sheets: AtomicUsize::new(0),
        };
        let cb: Arc<dyn ConversionProgressCallback> = Arc::new(tracker);

        cb.on_page_extracted(1, 1, 2);
        cb.on_page_extracted(1, 2, 0);
        cb.on_unit_error(1, Some(3), "engine timeout");
        cb.on_fallback(1, 4);
        cb.on_job_complete(1, 1);
    }

    #[test]
    fn tracking_counts() {
        let tracker = TrackingCallback {
            pages: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            fallbacks: AtomicUsize::new(0),
            sheets: AtomicUsize::new(0),
        };
        tracker.on_page_extracted(1, 1, 2);
        tracker.on_unit_error(2, None, "bad image");
        tracker.on_fallback(2, 0);
        tracker.on_job_complete(2, 2);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.fallbacks.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.sheets.load(Ordering::SeqCst), 2);
    }
}
