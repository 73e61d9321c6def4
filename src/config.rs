//! Configuration types for text-to-HTML formatting.
//!
//! All formatting behaviour is controlled through [`FormatConfig`], built via
//! its [`FormatConfigBuilder`]. Style overrides travel inside the config as an
//! explicit value ([`StyleOverrides`]) rather than being read from ambient
//! state, so the rule engine stays a pure function of its inputs.

use crate::error::FormatError;
use crate::pipeline::style::StyleOverrides;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a formatting run.
///
/// Built via [`FormatConfig::builder()`] or using [`FormatConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_text2html::{ClassifierMode, FormatConfig};
///
/// let config = FormatConfig::builder()
///     .mode(ClassifierMode::LocalOnly)
///     .include_toc(true)
///     .build()
///     .unwrap();
/// assert!(config.include_toc);
/// ```
#[derive(Clone)]
pub struct FormatConfig {
    /// Which classifier strategies to try. Default: [`ClassifierMode::Auto`].
    pub mode: ClassifierMode,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    /// If None along with `provider`, the environment is consulted.
    pub provider_name: Option<String>,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// URL of an HTTP classifier accepting `{"text", "instruction"}` and
    /// answering with a JSON element array. Tried before the LLM provider.
    pub endpoint: Option<String>,

    /// Sampling temperature for the remote classifier. Default: 0.1.
    ///
    /// Classification must be repeatable; anything above ~0.3 starts
    /// inventing headings.
    pub temperature: f32,

    /// Maximum tokens the remote classifier may generate. Default: 8192.
    ///
    /// The response repeats the whole document as JSON, so this bounds the
    /// largest document the remote path can handle before truncation turns
    /// into a malformed-JSON fallback.
    pub max_tokens: usize,

    /// Per-call remote classifier timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom classifier instruction. If None, uses the built-in default.
    pub instruction: Option<String>,

    /// Per-type and global style overrides merged over the defaults.
    pub styles: StyleOverrides,

    /// Prepend a table of contents built from `h2`/`h3` headings. Default: false.
    pub include_toc: bool,
}

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            mode: ClassifierMode::default(),
            provider: None,
            provider_name: None,
            model: None,
            endpoint: None,
            temperature: 0.1,
            max_tokens: 8192,
            api_timeout_secs: 60,
            instruction: None,
            styles: StyleOverrides::default(),
            include_toc: false,
        }
    }
}

impl fmt::Debug for FormatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatConfig")
            .field("mode", &self.mode)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("styles", &self.styles)
            .field("include_toc", &self.include_toc)
            .finish()
    }
}

impl FormatConfig {
    /// Create a new builder for `FormatConfig`.
    pub fn builder() -> FormatConfigBuilder {
        FormatConfigBuilder {
            config: Self::default(),
        }
    }

    /// Config that never leaves the process.
    pub fn local() -> Self {
        Self {
            mode: ClassifierMode::LocalOnly,
            ..Self::default()
        }
    }
}

/// Builder for [`FormatConfig`].
#[derive(Debug)]
pub struct FormatConfigBuilder {
    config: FormatConfig,
}

impl FormatConfigBuilder {
    pub fn mode(mut self, mode: ClassifierMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = Some(url.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    pub fn styles(mut self, styles: StyleOverrides) -> Self {
        self.config.styles = styles;
        self
    }

    pub fn include_toc(mut self, v: bool) -> Self {
        self.config.include_toc = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FormatConfig, FormatError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(FormatError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(FormatError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if let Some(ref url) = c.endpoint {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(FormatError::InvalidConfig(format!(
                    "endpoint must be an HTTP/HTTPS URL, got '{}'",
                    url
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which classifier strategies a run may use.
///
/// The local heuristic classifier and the paragraph-split fallback are always
/// in the chain; this only decides whether remote strategies go in front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClassifierMode {
    /// Remote strategies first (endpoint, then LLM provider), local on failure. (default)
    #[default]
    Auto,
    /// Never leave the process.
    LocalOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = FormatConfig::default();
        assert_eq!(c.mode, ClassifierMode::Auto);
        assert_eq!(c.temperature, 0.1);
        assert_eq!(c.api_timeout_secs, 60);
        assert!(!c.include_toc);
        assert!(c.styles.is_empty());
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = FormatConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = FormatConfig::builder().api_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, FormatError::InvalidConfig(_)));
    }

    #[test]
    fn non_http_endpoint_rejected() {
        let err = FormatConfig::builder()
            .endpoint("ftp://example.org/format")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("HTTP"));
    }

    #[test]
    fn local_config_skips_remote() {
        assert_eq!(FormatConfig::local().mode, ClassifierMode::LocalOnly);
    }
}
