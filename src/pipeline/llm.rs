//! The external extraction call.
//!
//! A document is extracted with exactly one request: the instruction prompt
//! plus every page image. There are no retries; a failed call becomes an
//! [`IntakeError::ExternalCall`] that the orchestrator hands back to the
//! caller.
//!
//! The call sits behind the [`ExtractionClient`] trait so the orchestrator
//! takes an explicitly constructed client instead of reaching for a global
//! one, and tests can substitute a scripted client.

use crate::config::IntakeConfig;
use crate::error::IntakeError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Sends one prompt plus page images and returns the model's raw text.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn extract(&self, prompt: &str, pages: Vec<ImageData>) -> Result<String, IntakeError>;
}

/// [`ExtractionClient`] backed by an edgequake-llm provider.
pub struct LlmExtractionClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout_secs: Option<u64>,
}

impl LlmExtractionClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &IntakeConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from config/environment and wrap it.
    pub fn from_config(config: &IntakeConfig) -> Result<Self, IntakeError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

#[async_trait]
impl ExtractionClient for LlmExtractionClient {
    async fn extract(&self, prompt: &str, pages: Vec<ImageData>) -> Result<String, IntakeError> {
        let start = Instant::now();
        let page_count = pages.len();
        let messages = vec![ChatMessage::user_with_images(prompt, pages)];

        let call = self.provider.chat(&messages, Some(&self.options));
        let result = match self.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), call)
                .await
                .map_err(|_| IntakeError::ExternalCall {
                    message: format!("no response after {}s", secs),
                })?,
            None => call.await,
        };

        let response = result.map_err(|e| IntakeError::ExternalCall {
            message: e.to_string(),
        })?;

        debug!(
            "Extraction of {} page(s): {} input tokens, {} output tokens, {:?}",
            page_count,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the intake config.
fn build_options(config: &IntakeConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, IntakeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        IntakeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`).
/// 2. **Named provider + model** (`config.provider_name`), API key read from
///    the provider's usual environment variable.
/// 3. **Environment pair** `DOCINTAKE_PROVIDER` + `DOCINTAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &IntakeConfig) -> Result<Arc<dyn LLMProvider>, IntakeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("DOCINTAKE_PROVIDER"),
        std::env::var("DOCINTAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", config.model_or_default());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| IntakeError::ProviderNotConfigured {
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
