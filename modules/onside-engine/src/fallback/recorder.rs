use async_trait::async_trait;
use onside_common::FallbackReason;
use onside_store::fallbacks::{self, NewFallback};
use sqlx::PgPool;
use uuid::Uuid;

/// One audit row: an abandoned attempt and what happened next.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackRecord {
    pub report_id: Option<Uuid>,
    pub original_provider: String,
    /// Provider tried next, or `"none"` when the chain ended here.
    pub fallback_provider: String,
    pub reason: FallbackReason,
    /// Whether the fallback attempt succeeded.
    pub success: bool,
    pub latency_ms: i64,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub attempt_number: i32,
}

/// Sink for fallback audit rows.
#[async_trait]
pub trait AttemptRecorder: Send + Sync {
    async fn record(&self, record: FallbackRecord) -> anyhow::Result<()>;
}

/// Discards records. Used for ad-hoc analyses with no report attached.
pub struct NoopRecorder;

#[async_trait]
impl AttemptRecorder for NoopRecorder {
    async fn record(&self, _record: FallbackRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes records to the `llm_fallbacks` table.
pub struct PgRecorder {
    pool: PgPool,
}

impl PgRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptRecorder for PgRecorder {
    async fn record(&self, record: FallbackRecord) -> anyhow::Result<()> {
        fallbacks::insert(
            &self.pool,
            NewFallback {
                report_id: record.report_id,
                original_provider: &record.original_provider,
                fallback_provider: &record.fallback_provider,
                reason: record.reason,
                success: record.success,
                latency_ms: record.latency_ms,
                prompt_tokens: record.prompt_tokens,
                completion_tokens: record.completion_tokens,
                attempt_number: record.attempt_number,
            },
        )
        .await?;
        Ok(())
    }
}
