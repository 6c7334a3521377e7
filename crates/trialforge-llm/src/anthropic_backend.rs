//! HTTP backend talking to the Anthropic Messages API. Grounded on the
//! teacher crate's `xchecker-llm::anthropic_backend`, generalized to this
//! engine's simpler text-in/text-out contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backend::LlmBackend;
use crate::error::LlmError;
use crate::types::GenerateRequest;

pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicBackend {
    #[must_use]
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a valid timeout");
        Self {
            client,
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com/v1/messages".to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: 8192,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&request.model, &e))?;

        if !response.status().is_success() {
            return Err(LlmError::Transport {
                model: request.model.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| LlmError::Transport {
            model: request.model.clone(),
            reason: format!("could not decode response body: {e}"),
        })?;

        Ok(parsed
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

fn map_reqwest_error(model: &str, e: &reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout {
            model: model.to_string(),
            timeout_secs: 180,
        }
    } else {
        LlmError::Transport {
            model: model.to_string(),
            reason: e.to_string(),
        }
    }
}
