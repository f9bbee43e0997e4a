//! Conversion entry points.
//!
//! A [`Converter`] owns the configuration, the staging directories and a
//! handle to the process-wide layout engine. Each `convert_*` call is one
//! job: stage uploads, run every file through the pipeline, assemble,
//! format and save the workbook, and return its download handle.
//!
//! Per-file and per-page failures degrade content but never fail the job;
//! only an empty upload list or an I/O failure on the output side is an
//! `Err`.

use crate::config::{ConversionConfig, ConversionMode};
use crate::engine::vision::{VisionEngineConfig, VisionLayoutEngine};
use crate::engine::{LayoutEngine, SharedEngine};
use crate::error::Doc2SheetError;
use crate::job::{ConversionJob, JobId, Staging, Upload};
use crate::output::{
    AdvancedResponse, ConversionOutput, Download, StandardResponse, XLSX_CONTENT_TYPE,
};
use crate::pipeline::assemble::{assemble, FileOutcome, Pipeline};
use crate::workbook::{format, xlsx};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Uploader recorded in the job log when the request names none.
const UNKNOWN_USER: &str = "unknown";

/// Document-to-workbook conversion service.
///
/// # Example
/// ```rust,no_run
/// use edgequake_doc2sheet::{ConversionConfig, Converter, Upload};
/// use edgequake_doc2sheet::engine::vision::VisionEngineConfig;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter =
///     Converter::with_vision_engine(ConversionConfig::default(), VisionEngineConfig::default())?;
/// let bytes = std::fs::read("invoice.png")?;
/// let reply = converter
///     .convert_standard(vec![Upload::new("invoice.png", bytes)])
///     .await?;
/// let download = converter.download(&reply.file_id).await?;
/// std::fs::write(&download.filename, &download.bytes)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConversionConfig,
    engine: SharedEngine,
    staging: Staging,
}

impl Converter {
    pub fn new(config: ConversionConfig, engine: Arc<dyn LayoutEngine>) -> Self {
        let staging = Staging::new(config.upload_dir.clone(), config.output_dir.clone());
        Self {
            config,
            engine: SharedEngine::new(engine),
            staging,
        }
    }

    /// Build a converter backed by the bundled vision-LLM engine.
    pub fn with_vision_engine(
        config: ConversionConfig,
        engine_config: VisionEngineConfig,
    ) -> Result<Self, Doc2SheetError> {
        let engine = VisionLayoutEngine::from_config(engine_config)?;
        Ok(Self::new(config, Arc::new(engine)))
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn staging(&self) -> &Staging {
        &self.staging
    }

    /// Run a standard-mode job: one sheet per file.
    pub async fn convert_standard(
        &self,
        uploads: Vec<Upload>,
    ) -> Result<StandardResponse, Doc2SheetError> {
        let output = self.convert(ConversionMode::Standard, uploads).await?;
        Ok(StandardResponse::from(&output))
    }

    /// Run an advanced-mode job: one sheet per table, one per page of text.
    pub async fn convert_advanced(
        &self,
        uploads: Vec<Upload>,
    ) -> Result<AdvancedResponse, Doc2SheetError> {
        let output = self.convert(ConversionMode::Advanced, uploads).await?;
        Ok(AdvancedResponse::from(&output))
    }

    /// Run one conversion job and report everything about it.
    pub async fn convert(
        &self,
        mode: ConversionMode,
        uploads: Vec<Upload>,
    ) -> Result<ConversionOutput, Doc2SheetError> {
        let started = Instant::now();
        if uploads.is_empty() {
            return Err(Doc2SheetError::NoFiles);
        }

        // ── Step 1: Stage uploads ────────────────────────────────────────
        let id = JobId::new();
        let user = uploads
            .first()
            .and_then(|u| u.user.clone())
            .unwrap_or_else(|| UNKNOWN_USER.to_string());
        let files = self.staging.stage_all(&id, &uploads).await?;
        drop(uploads);
        let job = ConversionJob { id, mode, files };
        info!("Job {} ({}): {} file(s) staged", job.id, mode, job.files.len());

        let total_files = job.files.len();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_job_start(total_files);
        }

        // ── Step 2: Run the pipeline per file ────────────────────────────
        let pipeline = Pipeline {
            engine: &self.engine,
            config: &self.config,
            mode,
            total_files,
        };
        let outcomes: Vec<FileOutcome> = stream::iter(
            job.files
                .iter()
                .enumerate()
                .map(|(idx, file)| pipeline.process_file(file, idx)),
        )
        .buffer_unordered(self.config.concurrency)
        .collect()
        .await;

        // ── Step 3: Assemble and format ──────────────────────────────────
        let (mut workbook, mut stats) = assemble(outcomes);
        let layouts = format::format_workbook(&mut workbook);
        let sheet_names: Vec<String> = workbook.sheet_names().into_iter().map(String::from).collect();

        // ── Step 4: Save ─────────────────────────────────────────────────
        let path = self.staging.output_path(&job.id, mode);
        let save_path = path.clone();
        tokio::task::spawn_blocking(move || xlsx::save(&workbook, &layouts, &save_path))
            .await
            .map_err(|e| Doc2SheetError::Internal(format!("save task failed: {e}")))??;

        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(user = %user, "Converted {} file(s)", total_files);
        debug!(
            "Job {}: {} sheets, {} pages, {} tables, {} degraded, {}ms",
            job.id, stats.sheets, stats.pages, stats.tables, stats.degraded_units, stats.duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_job_complete(total_files, stats.sheets);
        }

        Ok(ConversionOutput {
            job_id: job.id,
            mode,
            file_id: job.file_id(),
            path,
            sheet_names,
            stats,
        })
    }

    /// Fetch a saved workbook by its download handle.
    pub async fn download(&self, file_id: &str) -> Result<Download, Doc2SheetError> {
        let path = self.staging.resolve_download(file_id).await?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Doc2SheetError::OutputReadFailed {
                path: path.clone(),
                source: e,
            })?;
        Ok(Download {
            bytes,
            filename: self.config.download_filename.clone(),
            content_type: XLSX_CONTENT_TYPE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DetectedRegion, TextLine};
    use crate::error::EngineError;
    use crate::pipeline::source::Page;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl LayoutEngine for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn detect(&self, _page: &Page) -> Result<Vec<DetectedRegion>, EngineError> {
            Ok(vec![])
        }

        async fn recognize_text(&self, _page: &Page) -> Result<Vec<TextLine>, EngineError> {
            Ok(vec![])
        }
    }

    fn converter(dir: &tempfile::TempDir) -> Converter {
        let config = ConversionConfig::builder()
            .upload_dir(dir.path().join("uploads"))
            .output_dir(dir.path().join("outputs"))
            .build()
            .unwrap();
        Converter::new(config, Arc::new(Silent))
    }

    #[tokio::test]
    async fn empty_upload_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = converter(&dir).convert_standard(vec![]).await.unwrap_err();
        assert!(matches!(err, Doc2SheetError::NoFiles));
        assert_eq!(err.http_status(), 400);
        assert!(!dir.path().join("outputs").exists());
    }

    #[tokio::test]
    async fn unknown_download_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = converter(&dir).download("nope").await.unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn undecodable_upload_still_produces_a_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let conv = converter(&dir);
        let out = conv
            .convert(
                ConversionMode::Advanced,
                vec![Upload::new("junk.png", b"not an image".to_vec())],
            )
            .await
            .unwrap();
        assert_eq!(out.sheet_names, vec!["EMPTY"]);
        assert_eq!(out.stats.degraded_units, 1);
        assert!(out.file_id.starts_with("ADV_"));
        assert!(out.path.exists());
    }
}
