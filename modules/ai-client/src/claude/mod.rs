pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::error::AiError;
use crate::http::{build_http, post_json, DEFAULT_TIMEOUT};
use crate::traits::{Completion, CompletionProvider, CompletionRequest, Usage};

use types::*;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// =============================================================================
// Claude Provider
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AiError> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            http: build_http(DEFAULT_TIMEOUT)?,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, AiError> {
        self.http = build_http(timeout)?;
        Ok(self)
    }

    fn headers(&self) -> Result<HeaderMap, AiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| AiError::Config("invalid Anthropic API key".to_string()))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl CompletionProvider for Claude {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AiError> {
        // The messages API has no native JSON-schema mode; the schema rides in the system prompt.
        let system = match &request.response_schema {
            Some(schema) => format!(
                "{}\n\nRespond with a single JSON object matching this schema:\n{}",
                request.system, schema
            ),
            None => request.system.clone(),
        };

        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            messages: vec![WireMessage::user(&request.prompt)],
            system: Some(system),
            temperature: request.temperature,
        };

        let url = format!("{}/messages", self.base_url);
        let response: MessagesResponse =
            post_json(&self.http, &url, self.headers()?, &body, self.name()).await?;

        let text = response
            .text()
            .ok_or_else(|| AiError::InvalidResponse("no text in Claude response".to_string()))?;

        Ok(Completion {
            text,
            provider: self.name().to_string(),
            model: response.model.unwrap_or_else(|| self.model.clone()),
            usage: response.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
        })
    }
}
