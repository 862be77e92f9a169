use async_trait::async_trait;
use tracing::debug;

use super::Mailer;

/// Mailer used when no email provider is configured. Logs and succeeds.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        debug!(to, subject, "Email disabled, skipping send");
        Ok(())
    }
}
