//! Layout/OCR engine capability.
//!
//! The pipeline never looks at pixels itself. Structural analysis and text
//! recognition are delegated to a [`LayoutEngine`], an injected,
//! process-wide capability. [`vision::VisionLayoutEngine`] is the bundled
//! implementation backed by a vision LLM; tests substitute scripted fakes.
//!
//! Engines are not assumed to be reentrant. [`SharedEngine`] wraps an engine
//! and serialises calls through an async mutex unless the engine reports
//! [`LayoutEngine::is_reentrant`].

pub mod vision;

use crate::error::EngineError;
use crate::pipeline::source::Page;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A region detected on a page, in the engine's own vocabulary.
///
/// Classification into [`crate::pipeline::extract::Block`] happens once, at
/// the page extractor boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedRegion {
    /// Engine label: `table`, `text`, `title`, `figure`, …
    #[serde(rename = "type", default)]
    pub label: String,
    /// Table structure as HTML markup, for table regions.
    #[serde(default)]
    pub html: Option<String>,
    /// Recognised text inside the region.
    #[serde(default)]
    pub lines: Vec<String>,
}

impl DetectedRegion {
    pub fn table(html: impl Into<String>) -> Self {
        Self {
            label: "table".to_string(),
            html: Some(html.into()),
            lines: Vec::new(),
        }
    }

    pub fn text<I, S>(label: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            html: None,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_table(&self) -> bool {
        self.label.eq_ignore_ascii_case("table")
    }
}

/// One line of whole-page OCR output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl TextLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }
}

/// Structural analysis and OCR for single pages.
#[async_trait]
pub trait LayoutEngine: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Detect regions on a page, in reading order.
    async fn detect(&self, page: &Page) -> Result<Vec<DetectedRegion>, EngineError>;

    /// Recognise every text line on a page, ignoring structure.
    async fn recognize_text(&self, page: &Page) -> Result<Vec<TextLine>, EngineError>;

    /// Whether concurrent calls into this engine are safe.
    fn is_reentrant(&self) -> bool {
        false
    }
}

/// Process-wide handle to a layout engine.
#[derive(Clone)]
pub struct SharedEngine {
    engine: Arc<dyn LayoutEngine>,
    gate: Option<Arc<Mutex<()>>>,
}

impl SharedEngine {
    pub fn new(engine: Arc<dyn LayoutEngine>) -> Self {
        let gate = (!engine.is_reentrant()).then(|| Arc::new(Mutex::new(())));
        Self { engine, gate }
    }

    pub fn name(&self) -> &str {
        self.engine.name()
    }

    pub fn is_serialised(&self) -> bool {
        self.gate.is_some()
    }

    /// Detect regions on a page. `limit` bounds the engine call only; time
    /// spent queued behind other callers does not count against it.
    pub async fn detect(
        &self,
        page: &Page,
        limit: Option<Duration>,
    ) -> Result<Vec<DetectedRegion>, EngineError> {
        self.gated(limit, self.engine.detect(page)).await
    }

    /// Whole-page OCR, bounded the same way as [`SharedEngine::detect`].
    pub async fn recognize_text(
        &self,
        page: &Page,
        limit: Option<Duration>,
    ) -> Result<Vec<TextLine>, EngineError> {
        self.gated(limit, self.engine.recognize_text(page)).await
    }

    async fn gated<T, F>(&self, limit: Option<Duration>, call: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        let _guard = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };
        match limit {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| EngineError::TimedOut {
                    secs: limit.as_secs(),
                })?,
            None => call.await,
        }
    }
}

impl std::fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEngine")
            .field("engine", &self.engine.name())
            .field("serialised", &self.gate.is_some())
            .finish()
    }
}
