pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::AiError;
use crate::http::{build_http, post_json, DEFAULT_TIMEOUT};
use crate::traits::{Completion, CompletionProvider, CompletionRequest, Usage};

use types::*;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

// =============================================================================
// OpenAi Provider
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AiError> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_API_URL.to_string(),
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
        bearer_headers(&self.api_key)
    }
}

pub(crate) fn bearer_headers(api_key: &str) -> Result<HeaderMap, AiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| AiError::Config("invalid API key".to_string()))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Build a chat request. `strict_schema` selects native JSON-schema output;
/// otherwise a schema only switches on JSON-object mode.
pub(crate) fn chat_request(
    model: &str,
    request: &CompletionRequest,
    strict_schema: bool,
) -> ChatRequest {
    let response_format = request.response_schema.as_ref().map(|schema| {
        if strict_schema {
            ResponseFormat::json_schema(schema.clone())
        } else {
            ResponseFormat::json_object()
        }
    });

    let system = match (&request.response_schema, strict_schema) {
        (Some(schema), false) => format!(
            "{}\n\nRespond with a single JSON object matching this schema:\n{}",
            request.system, schema
        ),
        _ => request.system.clone(),
    };

    ChatRequest {
        model: model.to_string(),
        messages: vec![WireMessage::system(system), WireMessage::user(&request.prompt)],
        // gpt-5 family rejects explicit temperature
        temperature: if model.starts_with("gpt-5") {
            None
        } else {
            request.temperature
        },
        max_tokens: Some(request.max_tokens),
        response_format,
    }
}

pub(crate) fn into_completion(
    response: ChatResponse,
    provider: &str,
    fallback_model: &str,
) -> Result<Completion, AiError> {
    let model = response
        .model
        .clone()
        .unwrap_or_else(|| fallback_model.to_string());
    let usage = response.usage.as_ref().map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
    });
    let text = response
        .into_text()
        .ok_or_else(|| AiError::InvalidResponse(format!("no content in {provider} response")))?;

    Ok(Completion {
        text,
        provider: provider.to_string(),
        model,
        usage,
    })
}

#[async_trait]
impl CompletionProvider for OpenAi {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AiError> {
        let body = chat_request(&self.model, request, true);
        let url = format!("{}/chat/completions", self.base_url);
        let response: ChatResponse =
            post_json(&self.http, &url, self.headers()?, &body, self.name()).await?;
        into_completion(response, self.name(), &self.model)
    }
}
