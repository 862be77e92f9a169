use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::Mailer;

const SENDGRID_URL: &str = "https://api.sendgrid.com";

/// SendGrid v3 mail-send backend.
pub struct SendGridMailer {
    api_key: String,
    from: String,
    base_url: String,
    http: reqwest::Client,
}

impl SendGridMailer {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            from: from.into(),
            base_url: SENDGRID_URL.to_string(),
            http: crate::sources::http_client(Duration::from_secs(30))?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let payload = json!({
            "personalizations": [{"to": [{"email": to}]}],
            "from": {"email": self.from},
            "subject": subject,
            "content": [{"type": "text/plain", "value": body}],
        });

        let resp = self
            .http
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("SendGrid request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "SendGrid returned non-success");
            anyhow::bail!("SendGrid returned {status}");
        }

        Ok(())
    }
}
