use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::AiError;
use crate::http::{build_http, post_json, DEFAULT_TIMEOUT};
use crate::openai::types::ChatResponse;
use crate::openai::{bearer_headers, chat_request, into_completion};
use crate::traits::{Completion, CompletionProvider, CompletionRequest};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";

/// OpenRouter speaks the OpenAI chat-completions dialect, routed to any hosted model.
#[derive(Clone)]
pub struct OpenRouter {
    api_key: String,
    model: String,
    base_url: String,
    app_name: Option<String>,
    site_url: Option<String>,
    http: reqwest::Client,
}

impl OpenRouter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AiError> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENROUTER_API_URL.to_string(),
            app_name: None,
            site_url: None,
            http: build_http(DEFAULT_TIMEOUT)?,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn with_site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, AiError> {
        self.http = build_http(timeout)?;
        Ok(self)
    }

    fn headers(&self) -> Result<HeaderMap, AiError> {
        let mut headers = bearer_headers(&self.api_key)?;

        if let Some(ref url) = self.site_url {
            if let Ok(val) = HeaderValue::from_str(url) {
                headers.insert("HTTP-Referer", val);
            }
        }

        if let Some(ref name) = self.app_name {
            if let Ok(val) = HeaderValue::from_str(name) {
                headers.insert("X-Title", val);
            }
        }

        Ok(headers)
    }
}

#[async_trait]
impl CompletionProvider for OpenRouter {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AiError> {
        // Strict json_schema support varies by upstream model.
        let body = chat_request(&self.model, request, false);
        let url = format!("{}/chat/completions", self.base_url);
        let response: ChatResponse =
            post_json(&self.http, &url, self.headers()?, &body, self.name()).await?;
        into_completion(response, self.name(), &self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_include_attribution() {
        let ai = OpenRouter::new("key", "meta-llama/llama-3.1-70b-instruct")
            .unwrap()
            .with_app_name("OnSide")
            .with_site_url("https://onside.example.com");
        let headers = ai.headers().unwrap();
        assert_eq!(headers.get("X-Title").unwrap(), "OnSide");
        assert_eq!(
            headers.get("HTTP-Referer").unwrap(),
            "https://onside.example.com"
        );
        assert_eq!(headers.get("authorization").unwrap(), "Bearer key");
    }
}
