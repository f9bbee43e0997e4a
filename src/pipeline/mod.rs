//! Pipeline stages for document-to-workbook conversion.
//!
//! Each submodule implements one transformation step and is testable on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ extract ──▶ (fallback) ──▶ naming ──▶ assemble
//! (pages)    (blocks)    (OCR lines)    (sheets)   (workbook)
//! ```
//!
//! 1. [`source`]: decode a staged file into RGB pages; PDFs render on the
//!    blocking pool and stream through a bounded channel
//! 2. [`extract`]: ask the layout engine for regions and classify them into
//!    [`extract::Block`]s; table markup is parsed by [`html_table`]
//! 3. [`fallback`]: whole-page OCR for files without table data
//! 4. [`naming`]: positional, sanitised, collision-free sheet names
//! 5. [`assemble`]: per-mode sheet emission and the never-empty workbook

pub mod assemble;
pub mod extract;
pub mod fallback;
pub mod html_table;
pub mod naming;
pub mod source;
