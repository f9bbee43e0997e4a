//! Job identity and upload staging.
//!
//! Every conversion request gets a fresh [`JobId`] (UUID v4, 128 random
//! bits). Uploaded bytes are written once under `<upload_dir>/<jobId>_<name>`
//! and only read afterwards; the finished workbook lives at
//! `<output_dir>/<jobId>.xlsx` (standard) or `<output_dir>/ADV_<jobId>.xlsx`
//! (advanced). The file stem doubles as the download handle.

use crate::config::ConversionMode;
use crate::error::Doc2SheetError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Prefix that marks advanced-mode output files.
pub const ADVANCED_PREFIX: &str = "ADV_";

/// Opaque, globally unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// One uploaded file as received from the transport layer.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name (may contain directory parts).
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Uploader identity, used only for the job log line.
    pub user: Option<String>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
            user: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// Input format of a staged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Pdf,
    Image,
}

impl FileKind {
    /// Classify by magic bytes first, then by extension.
    pub fn detect(name: &str, head: &[u8]) -> Self {
        if head.starts_with(b"%PDF") || name.to_ascii_lowercase().ends_with(".pdf") {
            FileKind::Pdf
        } else {
            FileKind::Image
        }
    }
}

/// An upload after it has been written to durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub original_name: String,
    pub storage_path: PathBuf,
    pub kind: FileKind,
}

/// One conversion request's processing unit.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: JobId,
    pub mode: ConversionMode,
    pub files: Vec<StagedFile>,
}

impl ConversionJob {
    /// Download handle for this job's workbook.
    pub fn file_id(&self) -> String {
        file_id(&self.id, self.mode)
    }
}

/// Download handle for a job: the output file stem.
pub fn file_id(job: &JobId, mode: ConversionMode) -> String {
    match mode {
        ConversionMode::Standard => job.to_string(),
        ConversionMode::Advanced => format!("{ADVANCED_PREFIX}{job}"),
    }
}

/// Reduce a client-supplied name to a bare file name.
fn safe_file_name(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match last {
        "" | "." | ".." => "upload".to_string(),
        other => other.to_string(),
    }
}

/// Upload and output directories of a converter.
#[derive(Debug, Clone)]
pub struct Staging {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl Staging {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every upload of a job to the staging directory.
    ///
    /// A name repeated within one job is staged as `<jobId>_<n>_<name>`
    /// (n = 1-based file number) so no upload overwrites another.
    pub async fn stage_all(
        &self,
        job: &JobId,
        uploads: &[Upload],
    ) -> Result<Vec<StagedFile>, Doc2SheetError> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| Doc2SheetError::StagingFailed {
                path: self.upload_dir.clone(),
                source: e,
            })?;

        let mut seen = HashSet::new();
        let mut staged = Vec::with_capacity(uploads.len());

        for (idx, upload) in uploads.iter().enumerate() {
            let name = safe_file_name(&upload.filename);
            let stored_name = if seen.insert(name.clone()) {
                format!("{job}_{name}")
            } else {
                format!("{job}_{}_{name}", idx + 1)
            };
            let storage_path = self.upload_dir.join(stored_name);

            tokio::fs::write(&storage_path, &upload.bytes)
                .await
                .map_err(|e| Doc2SheetError::StagingFailed {
                    path: storage_path.clone(),
                    source: e,
                })?;

            let head = &upload.bytes[..upload.bytes.len().min(4)];
            let kind = FileKind::detect(&name, head);
            debug!(
                "Staged '{}' ({:?}, {} bytes) at {}",
                upload.filename,
                kind,
                upload.bytes.len(),
                storage_path.display()
            );

            staged.push(StagedFile {
                original_name: upload.filename.clone(),
                storage_path,
                kind,
            });
        }

        Ok(staged)
    }

    /// Where the workbook of `job` is saved.
    pub fn output_path(&self, job: &JobId, mode: ConversionMode) -> PathBuf {
        self.output_dir.join(format!("{}.xlsx", file_id(job, mode)))
    }

    /// Resolve a download handle to an existing workbook.
    pub async fn resolve_download(&self, file_id: &str) -> Result<PathBuf, Doc2SheetError> {
        let not_found = || Doc2SheetError::OutputNotFound {
            file_id: file_id.to_string(),
        };

        if file_id.is_empty()
            || file_id.contains(['/', '\\'])
            || file_id.contains("..")
        {
            return Err(not_found());
        }

        let path = self.output_dir.join(format!("{file_id}.xlsx"));
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(not_found()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_unique() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
    }

    #[test]
    fn advanced_file_id_is_prefixed() {
        let job = JobId::new();
        assert_eq!(file_id(&job, ConversionMode::Standard), job.to_string());
        assert_eq!(
            file_id(&job, ConversionMode::Advanced),
            format!("ADV_{job}")
        );
    }

    #[test]
    fn output_paths_follow_mode() {
        let staging = Staging::new("up", "out");
        let job = JobId::new();
        assert_eq!(
            staging.output_path(&job, ConversionMode::Standard),
            PathBuf::from("out").join(format!("{job}.xlsx"))
        );
        assert_eq!(
            staging.output_path(&job, ConversionMode::Advanced),
            PathBuf::from("out").join(format!("ADV_{job}.xlsx"))
        );
    }

    #[test]
    fn detects_pdf_by_magic_or_extension() {
        assert_eq!(FileKind::detect("scan.bin", b"%PDF"), FileKind::Pdf);
        assert_eq!(FileKind::detect("REPORT.PDF", b"\x89PNG"), FileKind::Pdf);
        assert_eq!(FileKind::detect("photo.jpg", b"\xff\xd8\xff\xe0"), FileKind::Image);
    }

    #[test]
    fn strips_directories_from_names() {
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("C:\\scans\\a.png"), "a.png");
        assert_eq!(safe_file_name(".."), "upload");
        assert_eq!(safe_file_name(""), "upload");
    }

    #[tokio::test]
    async fn stages_duplicate_names_separately() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path().join("up"), dir.path().join("out"));
        let job = JobId::new();
        let uploads = vec![
            Upload::new("page.png", b"one".to_vec()),
            Upload::new("page.png", b"two".to_vec()),
        ];

        let staged = staging.stage_all(&job, &uploads).await.unwrap();
        assert_eq!(staged.len(), 2);
        assert_ne!(staged[0].storage_path, staged[1].storage_path);
        assert!(staged[0]
            .storage_path
            .ends_with(format!("{job}_page.png")));
        assert_eq!(std::fs::read(&staged[1].storage_path).unwrap(), b"two");
    }

    #[tokio::test]
    async fn unknown_download_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path().join("up"), dir.path());
        for id in ["missing", "../secret", "", "a/b"] {
            let err = staging.resolve_download(id).await.unwrap_err();
            assert!(matches!(err, Doc2SheetError::OutputNotFound { .. }), "{id}");
        }

        std::fs::write(dir.path().join("known.xlsx"), b"xlsx").unwrap();
        let path = staging.resolve_download("known").await.unwrap();
        assert_eq!(path, dir.path().join("known.xlsx"));
    }
}
