//! Remote classification through an HTTP endpoint.
//!
//! Contract: `POST {url}` with body `{"text": …, "instruction": …}`; a 2xx
//! response carries a JSON array of elements (optionally inside a
//! ```` ```json ```` fence). Everything else (transport error, timeout,
//! non-2xx, malformed JSON, schema violation) is a [`ClassificationError`].
//!
//! This is the shape of a server-side proxy that keeps the model API key
//! off the client; it is tried before a locally configured LLM provider.

use crate::config::FormatConfig;
use crate::element::Element;
use crate::error::{ClassificationError, FormatError};
use crate::output::ClassifierKind;
use crate::pipeline::classify::{finish_remote, parse_elements, Classifier};
use crate::pipeline::tokenize::Tokenized;
use crate::prompts;
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Error bodies longer than this are cut in logs and status details.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    instruction: &'a str,
}

/// Classifier backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct EndpointClassifier {
    client: reqwest::Client,
    url: String,
    instruction: String,
    timeout_secs: u64,
}

impl EndpointClassifier {
    pub fn new(
        url: impl Into<String>,
        instruction: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, FormatError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FormatError::EndpointSetup {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            url,
            instruction: instruction.into(),
            timeout_secs,
        })
    }

    pub fn from_config(url: &str, config: &FormatConfig) -> Result<Self, FormatError> {
        Self::new(
            url,
            prompts::instruction(config.instruction.as_deref()),
            config.api_timeout_secs,
        )
    }

    fn transport_error(&self, e: reqwest::Error) -> ClassificationError {
        if e.is_timeout() {
            ClassificationError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            ClassificationError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl Classifier for EndpointClassifier {
    fn name(&self) -> &str {
        "endpoint"
    }

    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Endpoint
    }

    async fn classify(&self, doc: &Tokenized) -> Result<Vec<Element>, ClassificationError> {
        let start = Instant::now();
        let text = doc.text();
        let request = ClassifyRequest {
            text: &text,
            instruction: &self.instruction,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!("Endpoint answered HTTP {} in {:?}", status, start.elapsed());

        if !status.is_success() {
            return Err(ClassificationError::from_status(
                status.as_u16(),
                truncate(&body, MAX_ERROR_BODY),
            ));
        }

        finish_remote(parse_elements(&body)?)
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}…", &s[..i]),
        None => s.to_string(),
    }
}
