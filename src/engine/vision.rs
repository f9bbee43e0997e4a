//! Layout engine backed by a vision language model.
//!
//! Each call sends one page image (base64 PNG) with a JSON-only system prompt
//! from [`crate::prompts`] and parses the reply. Tables come back as HTML and
//! are turned into rows later by the page extractor, exactly like tables from
//! any other engine.
//!
//! ## Retry Strategy
//!
//! Provider errors are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`). A reply that is not valid JSON counts as
//! a failed attempt too.

use crate::engine::{DetectedRegion, LayoutEngine, TextLine};
use crate::error::{Doc2SheetError, EngineError};
use crate::pipeline::source::Page;
use crate::prompts::{LAYOUT_SYSTEM_PROMPT, OCR_SYSTEM_PROMPT};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Settings for [`VisionLayoutEngine`].
#[derive(Clone)]
pub struct VisionEngineConfig {
    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`] where a model is required.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens per reply. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts after the first failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds. Default: 500.
    pub retry_backoff_ms: u64,

    /// Override for [`LAYOUT_SYSTEM_PROMPT`].
    pub layout_prompt: Option<String>,
}

impl Default for VisionEngineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            layout_prompt: None,
        }
    }
}

impl fmt::Debug for VisionEngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionEngineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

/// [`LayoutEngine`] that asks a vision LLM to analyse each page.
pub struct VisionLayoutEngine {
    provider: Arc<dyn LLMProvider>,
    config: VisionEngineConfig,
}

impl VisionLayoutEngine {
    /// Build an engine around an already-resolved provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: VisionEngineConfig) -> Self {
        Self { provider, config }
    }

    /// Resolve the provider from the config and the environment.
    pub fn from_config(config: VisionEngineConfig) -> Result<Self, Doc2SheetError> {
        let provider = resolve_provider(&config)?;
        Ok(Self::new(provider, config))
    }

    /// Send one page with `system_prompt` and parse the reply as `T`.
    async fn ask<T: DeserializeOwned>(
        &self,
        page: &Page,
        system_prompt: &str,
    ) -> Result<T, EngineError> {
        let image = page_image_data(&page.image)
            .map_err(|e| EngineError::Failed(format!("image encoding failed: {e}")))?;

        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user_with_images("", vec![image]),
        ];
        let options = CompletionOptions {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            ..Default::default()
        };

        let label = page.label();
        let mut last_err = EngineError::Failed("no attempt made".to_string());

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = self.config.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    label, attempt, self.config.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens",
                        label, response.prompt_tokens, response.completion_tokens
                    );
                    match parse_json_reply::<T>(&response.content) {
                        Ok(parsed) => return Ok(parsed),
                        Err(e) => {
                            warn!("{}: attempt {} unparseable: {}", label, attempt + 1, e);
                            last_err = e;
                        }
                    }
                }
                Err(e) => {
                    warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                    last_err = EngineError::Failed(e.to_string());
                }
            }
        }

        Err(last_err)
    }
}

#[derive(Debug, Deserialize)]
struct LayoutReply {
    #[serde(default)]
    regions: Vec<DetectedRegion>,
}

#[derive(Debug, Deserialize)]
struct OcrReply {
    #[serde(default)]
    lines: Vec<String>,
}

#[async_trait]
impl LayoutEngine for VisionLayoutEngine {
    fn name(&self) -> &str {
        "vision-llm"
    }

    async fn detect(&self, page: &Page) -> Result<Vec<DetectedRegion>, EngineError> {
        let prompt = self
            .config
            .layout_prompt
            .as_deref()
            .unwrap_or(LAYOUT_SYSTEM_PROMPT);
        let reply: LayoutReply = self.ask(page, prompt).await?;
        Ok(reply.regions)
    }

    async fn recognize_text(&self, page: &Page) -> Result<Vec<TextLine>, EngineError> {
        let reply: OcrReply = self.ask(page, OCR_SYSTEM_PROMPT).await?;
        Ok(reply.lines.into_iter().map(TextLine::new).collect())
    }

    // Provider clients are plain HTTP clients.
    fn is_reentrant(&self) -> bool {
        true
    }
}

/// Page pixels as an inline PNG attachment, sent at high detail so small
/// table text stays legible.
fn page_image_data(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageFormat::Png)?;
    let png = png.into_inner();
    debug!("Page attachment: {} PNG bytes", png.len());
    Ok(ImageData::new(STANDARD.encode(&png), "image/png").with_detail("high"))
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*)\n```\s*$").unwrap());

/// Parse a model reply that should be a single JSON object.
///
/// Tolerates outer code fences and prose around the object.
fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T, EngineError> {
    let trimmed = raw.trim().trim_start_matches('\u{FEFF}');
    let unfenced = match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => trimmed,
    };

    let body = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => {
            return Err(EngineError::MalformedResponse(format!(
                "no JSON object in reply ({} bytes)",
                raw.len()
            )))
        }
    };

    serde_json::from_str(body).map_err(|e| EngineError::MalformedResponse(e.to_string()))
}

/// Pick the vision provider. The first source that applies wins: an injected
/// provider, an explicit provider name, the `EDGEQUAKE_LLM_PROVIDER` and
/// `EDGEQUAKE_MODEL` pair, an `OPENAI_API_KEY`, then whatever
/// `ProviderFactory::from_env` detects.
fn resolve_provider(config: &VisionEngineConfig) -> Result<Arc<dyn LLMProvider>, Doc2SheetError> {
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(provider) = &config.provider {
        return Ok(Arc::clone(provider));
    }
    if let Some(name) = &config.provider_name {
        return named_provider(name, model);
    }
    if let (Some(name), Some(env_model)) = (
        env_var("EDGEQUAKE_LLM_PROVIDER"),
        env_var("EDGEQUAKE_MODEL"),
    ) {
        return named_provider(&name, &env_model);
    }
    if env_var("OPENAI_API_KEY").is_some() {
        return named_provider("openai", model);
    }

    ProviderFactory::from_env()
        .map(|(llm, _embedding)| llm)
        .map_err(|e| Doc2SheetError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "no vision provider found in the environment ({e}); \
                 set OPENAI_API_KEY or pass --provider"
            ),
        })
}

fn named_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Doc2SheetError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        Doc2SheetError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: e.to_string(),
        }
    })
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn parses_bare_layout_json() {
        let reply: LayoutReply = parse_json_reply(
            r#"{"regions":[{"type":"table","html":"<table><tr><td>1</td></tr></table>"},{"type":"text","lines":["Total"]}]}"#,
        )
        .unwrap();
        assert_eq!(reply.regions.len(), 2);
        assert!(reply.regions[0].is_table());
        assert_eq!(reply.regions[1].lines, vec!["Total"]);
    }

    #[test]
    fn strips_json_fences() {
        let reply: OcrReply =
            parse_json_reply("```json\n{\"lines\": [\"a\", \"b\"]}\n```").unwrap();
        assert_eq!(reply.lines, vec!["a", "b"]);
    }

    #[test]
    fn tolerates_prose_around_object() {
        let reply: OcrReply =
            parse_json_reply("Here is the result:\n{\"lines\": [\"x\"]}\nDone.").unwrap();
        assert_eq!(reply.lines, vec!["x"]);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let reply: LayoutReply = parse_json_reply("{}").unwrap();
        assert!(reply.regions.is_empty());
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_json_reply::<OcrReply>("I cannot read this page.").unwrap_err();
        assert!(matches!(err, EngineError::MalformedResponse(_)));
    }

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = page_image_data(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(decoded.starts_with(b"\x89PNG"));
    }

    #[test]
    fn default_config_is_deterministic() {
        let c = VisionEngineConfig::default();
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.max_retries, 2);
    }
}
