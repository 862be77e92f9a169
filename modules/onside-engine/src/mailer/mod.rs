//! Report delivery by email.

mod noop;
mod sendgrid;

pub use noop::NoopMailer;
pub use sendgrid::SendGridMailer;

use async_trait::async_trait;
use onside_common::{EmailRecipient, Report};
use onside_store::email;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::reports::render_text;

/// Pluggable email backend.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliverySummary {
    pub sent: usize,
    pub failed: usize,
}

/// Email a report to each active recipient, one delivery row per recipient.
/// A failed send is recorded on its row and does not stop the others.
pub async fn deliver_report(
    pool: &PgPool,
    mailer: &dyn Mailer,
    report: &Report,
    recipients: &[EmailRecipient],
) -> anyhow::Result<DeliverySummary> {
    let subject = format!("[OnSide] {}", report.title);
    let body = render_text(report);
    let mut summary = DeliverySummary::default();

    for recipient in recipients.iter().filter(|r| r.is_active) {
        let delivery_id = email::create_delivery(pool, recipient.id, report.id).await?;

        match mailer.send(&recipient.email, &subject, &body).await {
            Ok(()) => {
                email::mark_sent(pool, delivery_id).await?;
                summary.sent += 1;
            }
            Err(e) => {
                warn!(
                    report_id = %report.id,
                    recipient = recipient.email.as_str(),
                    error = %e,
                    "Email delivery failed"
                );
                email::mark_failed(pool, delivery_id, &format!("{e:#}")).await?;
                summary.failed += 1;
            }
        }
    }

    info!(
        report_id = %report.id,
        sent = summary.sent,
        failed = summary.failed,
        "Report delivered"
    );
    Ok(summary)
}
