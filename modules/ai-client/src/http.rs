use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::AiError;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn build_http(timeout: Duration) -> Result<reqwest::Client, AiError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AiError::Config(format!("failed to build HTTP client: {e}")))
}

/// POST a JSON body and decode a JSON response, classifying failures.
pub(crate) async fn post_json<Req, Resp>(
    http: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    body: &Req,
    provider: &str,
) -> Result<Resp, AiError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    debug!(provider, url, "LLM request");

    let response = http.post(url).headers(headers).json(body).send().await?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(AiError::RateLimited { retry_after });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AiError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(AiError::from)
}
