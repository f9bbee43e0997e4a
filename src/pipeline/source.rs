//! Page source: turn a staged file into raster pages.
//!
//! Images decode to exactly one RGB page. PDFs are rasterised page by page
//! with pdfium, in document order, optionally truncated to the first
//! `max_pages` pages.
//!
//! pdfium is not async-safe, so decoding runs on the blocking pool
//! (`spawn_blocking`). Pages travel to the pipeline through a channel of
//! capacity 1: the renderer stays at most one page ahead of extraction. The
//! resulting [`PageStream`] is single-pass.

use crate::error::DecodeError;
use crate::job::{FileKind, StagedFile};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One rasterised unit of an input file.
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based position of the file within its job.
    pub file_index: usize,
    /// 0-based position of the page within its file.
    pub page_index: usize,
    pub image: DynamicImage,
}

impl Page {
    /// Human-readable location for log lines (1-based).
    pub fn label(&self) -> String {
        format!("file {} page {}", self.file_index + 1, self.page_index + 1)
    }
}

/// Lazy, finite, single-pass sequence of pages from one file.
///
/// Yields `Ok(page)` items in order. A decode failure is yielded once as
/// `Err` and ends the stream.
pub struct PageStream {
    rx: mpsc::Receiver<Result<Page, DecodeError>>,
    finished: bool,
}

impl PageStream {
    pub async fn next(&mut self) -> Option<Result<Page, DecodeError>> {
        if self.finished {
            return None;
        }
        let item = self.rx.recv().await;
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        item
    }
}

/// Start decoding `file` into pages.
///
/// `max_pages` truncates PDFs; images always yield one page.
pub fn pages(
    file: &StagedFile,
    file_index: usize,
    max_pages: Option<usize>,
    max_pixels: u32,
) -> PageStream {
    let (tx, rx) = mpsc::channel(1);
    let path = file.storage_path.clone();
    let kind = file.kind;

    tokio::task::spawn_blocking(move || match kind {
        FileKind::Image => {
            let item = decode_image(&path).map(|image| Page {
                file_index,
                page_index: 0,
                image,
            });
            let _ = tx.blocking_send(item);
        }
        FileKind::Pdf => render_pdf_blocking(&path, file_index, max_pages, max_pixels, &tx),
    });

    PageStream {
        rx,
        finished: false,
    }
}

/// Decode the first page of `file`, if it has one.
pub async fn first_page(
    file: &StagedFile,
    file_index: usize,
    max_pixels: u32,
) -> Result<Option<Page>, DecodeError> {
    pages(file, file_index, Some(1), max_pixels).next().await.transpose()
}

/// Decode an image file and normalise it to RGB.
fn decode_image(path: &Path) -> Result<DynamicImage, DecodeError> {
    let reader = image::ImageReader::open(path)
        .map_err(|e| DecodeError::Unreadable {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?
        .with_guessed_format()
        .map_err(|e| DecodeError::Unreadable {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let image = reader.decode().map_err(|e| DecodeError::Image {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    debug!(
        "Decoded image {} → {}x{} px",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Bind to a pdfium library.
///
/// Resolution order: `PDFIUM_LIB_PATH`, the working directory, the system
/// library search path.
fn bind_pdfium() -> Result<Pdfium, PdfiumError> {
    if let Ok(env_path) = std::env::var("PDFIUM_LIB_PATH") {
        if !env_path.is_empty() {
            return Pdfium::bind_to_library(PathBuf::from(env_path)).map(Pdfium::new);
        }
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
}

/// Rasterise a PDF, sending each page as soon as it is rendered.
fn render_pdf_blocking(
    pdf_path: &Path,
    file_index: usize,
    max_pages: Option<usize>,
    max_pixels: u32,
    tx: &mpsc::Sender<Result<Page, DecodeError>>,
) {
    let pdf_error = |detail: String| DecodeError::Pdf {
        path: pdf_path.to_path_buf(),
        detail,
    };

    let pdfium = match bind_pdfium() {
        Ok(p) => p,
        Err(e) => {
            let _ = tx.blocking_send(Err(pdf_error(format!("pdfium unavailable: {e:?}"))));
            return;
        }
    };

    let document = match pdfium.load_pdf_from_file(pdf_path, None) {
        Ok(d) => d,
        Err(e) => {
            let _ = tx.blocking_send(Err(pdf_error(format!("{e:?}"))));
            return;
        }
    };

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let wanted = max_pages.map_or(total_pages, |cap| cap.min(total_pages));
    info!(
        "PDF {} loaded: {} pages, rendering {}",
        pdf_path.display(),
        total_pages,
        wanted
    );

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    for idx in 0..wanted {
        let rendered = match pages.get(idx as u16) {
            Ok(page) => page
                .render_with_config(&render_config)
                .map(|bitmap| DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8())),
            Err(e) => Err(e),
        };

        let item = match rendered {
            Ok(image) => {
                debug!(
                    "Rendered page {} → {}x{} px",
                    idx + 1,
                    image.width(),
                    image.height()
                );
                Ok(Page {
                    file_index,
                    page_index: idx,
                    image,
                })
            }
            Err(e) => Err(pdf_error(format!("page {}: {e:?}", idx + 1))),
        };

        let failed = item.is_err();
        if tx.blocking_send(item).is_err() {
            warn!("Page consumer for {} went away; stopping", pdf_path.display());
            return;
        }
        if failed {
            return;
        }
    }
}
