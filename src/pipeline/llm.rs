//! Language-model collaborators: the report analyzer and the vision fallback.
//!
//! Both are traits so the auditor can be exercised end-to-end without a
//! network. The provided implementations wrap an `edgequake_llm` provider
//! and share one call path: every attempt is bounded by `api_timeout_secs`
//! and failures are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`: 500 ms → 1 s → 2 s with the defaults,
//! capped at one minute).
//!
//! All prompt text lives in [`crate::prompts`].

use crate::config::AuditConfig;
use crate::error::{AnalysisError, AuditError};
use crate::pipeline::encode::png_image_data;
use crate::pipeline::preview;
use crate::prompts::VISION_TRANSCRIPTION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Opaque text-in/text-out analysis service.
#[async_trait]
pub trait ReportAnalyzer: Send + Sync {
    /// Score `document_text` against the checklist described by `prompt`.
    async fn analyze(&self, document_text: &str, prompt: &str) -> Result<String, AnalysisError>;
}

/// Vision-capable service that transcribes one page image.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn analyze_image(&self, png: &[u8], page_num: usize) -> Result<String, AnalysisError>;
}

/// Retry and sampling settings shared by both LLM-backed collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSettings {
    pub temperature: f32,
    pub max_tokens: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub api_timeout_secs: u64,
}

impl From<&AuditConfig> for CallSettings {
    fn from(config: &AuditConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }
}

impl CallSettings {
    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

/// [`ReportAnalyzer`] backed by a chat completion.
///
/// The checklist prompt goes in the system message and the (truncated)
/// document text in the user message.
pub struct LlmReportAnalyzer {
    provider: Arc<dyn LLMProvider>,
    settings: CallSettings,
    max_input_chars: usize,
}

impl LlmReportAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: CallSettings, max_input_chars: usize) -> Self {
        Self {
            provider,
            settings,
            max_input_chars,
        }
    }
}

#[async_trait]
impl ReportAnalyzer for LlmReportAnalyzer {
    async fn analyze(&self, document_text: &str, prompt: &str) -> Result<String, AnalysisError> {
        let (text, truncated) = fit_input(document_text, self.max_input_chars);
        if truncated {
            warn!(
                "Document text truncated to {} chars for analysis ({} total)",
                self.max_input_chars,
                document_text.chars().count()
            );
        }
        let messages = vec![ChatMessage::system(prompt), ChatMessage::user(&text)];
        chat_with_retry(self.provider.as_ref(), &messages, &self.settings, "analysis").await
    }
}

/// [`VisionClient`] backed by a multimodal chat completion.
pub struct LlmVisionClient {
    provider: Arc<dyn LLMProvider>,
    settings: CallSettings,
}

impl LlmVisionClient {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: CallSettings) -> Self {
        Self { provider, settings }
    }
}

#[async_trait]
impl VisionClient for LlmVisionClient {
    async fn analyze_image(&self, png: &[u8], page_num: usize) -> Result<String, AnalysisError> {
        // The image carries all the content; the user text stays empty.
        let messages = vec![
            ChatMessage::system(VISION_TRANSCRIPTION_PROMPT),
            ChatMessage::user_with_images("", vec![png_image_data(png)]),
        ];
        let label = format!("vision page {page_num}");
        chat_with_retry(self.provider.as_ref(), &messages, &self.settings, &label).await
    }
}

/// One chat call with per-attempt timeout and exponential backoff.
async fn chat_with_retry(
    provider: &dyn LLMProvider,
    messages: &[ChatMessage],
    settings: &CallSettings,
    label: &str,
) -> Result<String, AnalysisError> {
    let options = settings.options();
    let start = Instant::now();
    let mut last_err = AnalysisError::EmptyResponse;

    for attempt in 0..=settings.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(settings.retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label, attempt, settings.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let call = provider.chat(messages, Some(&options));
        match timeout(Duration::from_secs(settings.api_timeout_secs), call).await {
            Ok(Ok(response)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    label,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                let content = response.content.trim();
                if content.is_empty() {
                    return Err(AnalysisError::EmptyResponse);
                }
                debug!("{}: response preview: {}", label, preview(content));
                return Ok(content.to_string());
            }
            Ok(Err(e)) => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                last_err = AnalysisError::Provider {
                    retries: attempt,
                    detail: e.to_string(),
                };
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {}s",
                    label,
                    attempt + 1,
                    settings.api_timeout_secs
                );
                last_err = AnalysisError::Timeout {
                    secs: settings.api_timeout_secs,
                };
            }
        }
    }

    Err(last_err)
}

/// First `max` characters of `text`, and whether anything was cut.
/// Longest wait between two attempts.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Exponential backoff before retry `attempt` (1-based), capped.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(u64::MAX, |factor| base_ms.saturating_mul(factor))
        .min(MAX_BACKOFF_MS)
}

/// Cut the document body to `max` chars and keep the trailing
/// `[INFO] extraction=` tag intact.
fn fit_input(text: &str, max: usize) -> (String, bool) {
    match text.rsplit_once(INFO_TAG_SEPARATOR) {
        Some((body, tag)) if tag.starts_with("extraction=") => {
            let (body, truncated) = truncate_chars(body, max);
            (format!("{body}{INFO_TAG_SEPARATOR}{tag}"), truncated)
        }
        _ => {
            let (text, truncated) = truncate_chars(text, max);
            (text.to_string(), truncated)
        }
    }
}

const INFO_TAG_SEPARATOR: &str = "\n\n[INFO] ";

fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

const DEFAULT_MODEL: &str = "gpt-4.1-mini";

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AuditError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AuditError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is;
/// 2. `config.provider_name` with `config.model`;
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set;
/// 4. OpenAI when `OPENAI_API_KEY` is set;
/// 5. `ProviderFactory::from_env` auto-detection.
pub fn resolve_provider(config: &AuditConfig) -> Result<Arc<dyn LLMProvider>, AuditError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        info!("Using provider '{}' with model '{}'", name, model);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AuditError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
