//! Transcription client: one page payload in, one [`PageResult`] out.
//!
//! [`Transcriber`] is the seam to the external vision service. It may fail,
//! and says so with a typed [`PageError`]. [`transcribe_page`] wraps any
//! transcriber in the no-throw contract the dispatcher relies on: it applies
//! the per-call timeout, tidies the text, and turns every failure into an
//! error-status result carrying a visible marker. A single bad page therefore
//! never aborts the batch.
//!
//! ## Message Layout
//!
//! [`VisionTranscriber`] sends, in order:
//! 1. **System message** — the transcription instruction (or a user override)
//! 2. **User message** — the page instruction naming the page number, with the
//!    page attached as a base64 image
//!
//! No retries: a failed call is reported once and the batch moves on.

use crate::config::{PipelineConfig, DEFAULT_MODEL};
use crate::error::{PageError, ScribeError};
use crate::output::PageResult;
use crate::pipeline::encode;
use crate::pipeline::extract::PagePayload;
use crate::pipeline::postprocess;
use crate::prompts::{page_instruction, SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Text returned by a transcription service for one page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transcription {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Transcription {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Sends one page to a transcription service.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, page: &PagePayload) -> Result<Transcription, PageError>;
}

/// Transcribe `page`, never failing.
///
/// The payload is consumed and dropped as soon as the call settles.
pub async fn transcribe_page(
    transcriber: &dyn Transcriber,
    page: PagePayload,
    timeout: Duration,
    clean: bool,
) -> PageResult {
    let start = Instant::now();
    let page_num = page.page_num;

    let outcome = tokio::time::timeout(timeout, transcriber.transcribe(&page)).await;
    drop(page);

    let mut result = match outcome {
        Ok(Ok(t)) => {
            let content = if clean {
                postprocess::clean_transcription(&t.text)
            } else {
                t.text
            };
            // Checked after cleaning: an empty fence or a lone zero-width
            // character is still an empty answer.
            if content.trim().is_empty() {
                PageResult::failed(PageError::EmptyResponse { page: page_num })
            } else {
                PageResult {
                    input_tokens: t.input_tokens,
                    output_tokens: t.output_tokens,
                    ..PageResult::ok(page_num, content)
                }
            }
        }
        Ok(Err(e)) => PageResult::failed(e),
        Err(_) => PageResult::failed(PageError::Timeout {
            page: page_num,
            secs: timeout.as_secs(),
        }),
    };

    // The result always belongs to the payload it was made from.
    result.page_num = page_num;
    result.duration_ms = start.elapsed().as_millis() as u64;

    match result.error() {
        None => debug!(
            "Page {}: {} chars, {} input tokens, {} output tokens, {}ms",
            page_num,
            result.content.len(),
            result.input_tokens,
            result.output_tokens,
            result.duration_ms
        ),
        Some(e) => warn!("Page {}: {}", page_num, e),
    }

    result
}

// ── Vision LLM implementation ────────────────────────────────────────────

/// [`Transcriber`] backed by an `edgequake-llm` vision provider.
pub struct VisionTranscriber {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
}

impl VisionTranscriber {
    /// Wrap an already constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
            options: build_options(config),
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ScribeError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }
}

impl fmt::Debug for VisionTranscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionTranscriber")
            .field("provider", &"<dyn LLMProvider>")
            .field("system_prompt_len", &self.system_prompt.len())
            .field("max_tokens", &self.options.max_tokens)
            .finish()
    }
}

#[async_trait]
impl Transcriber for VisionTranscriber {
    async fn transcribe(&self, page: &PagePayload) -> Result<Transcription, PageError> {
        let image = vision_attachment(page)?;
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(page_instruction(page.page_num), vec![image]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| PageError::Service {
                page: page.page_num,
                detail: e.to_string(),
            })?;

        Ok(Transcription {
            text: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}

/// Encode `page` for a vision request, refusing formats vision APIs reject.
///
/// Payloads from [`crate::pipeline::extract::PdfSplitter`] are single-page
/// PDFs; sending them would only earn an opaque HTTP 400 per page.
fn vision_attachment(page: &PagePayload) -> Result<ImageData, PageError> {
    let image = encode::to_image_data(page);
    if image.is_supported_mime() {
        Ok(image)
    } else {
        Err(PageError::UnsupportedPayload {
            page: page.page_num,
            mime: page.mime_type.to_string(),
        })
    }
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Named provider** (`config.provider_name`) with `config.model`
///    (default [`DEFAULT_MODEL`]); the API key comes from that provider's
///    usual environment variable.
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 3. **OpenAI** whenever `OPENAI_API_KEY` is set.
/// 4. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, ScribeError> {
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ScribeError::ProviderNotConfigured {
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

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ScribeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ScribeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
