//! Remote classification through an `edgequake-llm` provider.
//!
//! The request is two messages: the instruction as the system turn and the
//! document text (placeholders intact) as the user turn. The reply must be
//! a JSON array of elements; anything else is a [`ClassificationError`] and
//! the chain moves on to the next strategy.
//!
//! ## No retries
//!
//! A classification is triggered by a user action and the local classifier
//! is always available, so a failed call falls back immediately instead of
//! backing off. The call is bounded by `api_timeout_secs`.

use crate::config::{FormatConfig, DEFAULT_MODEL};
use crate::element::Element;
use crate::error::{ClassificationError, FormatError};
use crate::output::ClassifierKind;
use crate::pipeline::classify::{finish_remote, parse_elements, Classifier};
use crate::pipeline::tokenize::Tokenized;
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Classifier backed by a chat-completion provider.
pub struct LlmClassifier {
    provider: Arc<dyn LLMProvider>,
    instruction: String,
    options: CompletionOptions,
    timeout_secs: u64,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &FormatConfig) -> Self {
        Self {
            provider,
            instruction: prompts::instruction(config.instruction.as_deref()).to_string(),
            options: build_options(config),
            timeout_secs: config.api_timeout_secs,
        }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn name(&self) -> &str {
        "llm"
    }

    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Llm
    }

    async fn classify(&self, doc: &Tokenized) -> Result<Vec<Element>, ClassificationError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(self.instruction.as_str()),
            ChatMessage::user(doc.text()),
        ];

        let response = timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.chat(&messages, Some(&self.options)),
        )
        .await
        .map_err(|_| ClassificationError::Timeout {
            secs: self.timeout_secs,
        })?
        .map_err(|e| ClassificationError::from_provider_message(e.to_string()))?;

        debug!(
            "LLM classifier: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        finish_remote(parse_elements(&response.content)?)
    }
}

/// Build `CompletionOptions` from the format config.
fn build_options(config: &FormatConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, FormatError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        FormatError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
///
/// 2. **Named provider + model** (`config.provider_name`): built with
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key (`GEMINI_API_KEY`, `OPENAI_API_KEY`, …) from the environment. The
///    model defaults to [`DEFAULT_MODEL`].
///
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`):
///    checked before auto-detection so the model choice is honoured even
///    when several API keys are present.
///
/// 4. **Full auto-detection** (`ProviderFactory::from_env`): the first
///    provider with an API key wins.
pub fn resolve_provider(config: &FormatConfig) -> Result<Arc<dyn LLMProvider>, FormatError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| FormatError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --local-only.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = FormatConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    #[test]
    fn build_options_follow_builder() {
        let config = FormatConfig::builder()
            .temperature(0.0)
            .max_tokens(1024)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(1024));
    }
}
