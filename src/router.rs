//! Mode classifier: pick standard or advanced conversion from a free-text
//! task description.
//!
//! Case-insensitive substring match against a fixed keyword list. Any hit
//! selects advanced mode.

use crate::config::ConversionMode;
use serde::{Deserialize, Serialize};

/// Phrases that indicate a document needs full per-page decomposition.
pub const ADVANCED_KEYWORDS: &[&str] = &[
    "handwritten",
    "unclear",
    "multiple tables",
    "many pages",
    "scanned",
    "complex",
    "merged cells",
    "symbols",
];

/// Endpoint served by the standard converter.
pub const STANDARD_ENDPOINT: &str = "/convert-multiple/";
/// Endpoint served by the advanced converter.
pub const ADVANCED_ENDPOINT: &str = "/convert-advanced/";

/// Result of [`route_task`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub mode: ConversionMode,
    pub endpoint: String,
    pub message: String,
}

/// Classify a task description.
///
/// ```rust
/// use edgequake_doc2sheet::{route_task, ConversionMode};
///
/// assert_eq!(route_task("This file has handwritten notes").mode, ConversionMode::Advanced);
/// assert_eq!(route_task("simple invoice").mode, ConversionMode::Standard);
/// ```
pub fn route_task(task: &str) -> RouteDecision {
    let task = task.to_lowercase();

    if ADVANCED_KEYWORDS.iter().any(|word| task.contains(word)) {
        RouteDecision {
            mode: ConversionMode::Advanced,
            endpoint: ADVANCED_ENDPOINT.to_string(),
            message: "Advanced Document Agent selected".to_string(),
        }
    } else {
        RouteDecision {
            mode: ConversionMode::Standard,
            endpoint: STANDARD_ENDPOINT.to_string(),
            message: "Standard Document Agent selected".to_string(),
        }
    }
}
