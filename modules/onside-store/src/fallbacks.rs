use anyhow::Result;
use chrono::Utc;
use onside_common::{FallbackReason, FallbackUsage, LlmFallback};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::row::text_enum;

pub struct NewFallback<'a> {
    pub report_id: Option<Uuid>,
    pub original_provider: &'a str,
    pub fallback_provider: &'a str,
    pub reason: FallbackReason,
    pub success: bool,
    pub latency_ms: i64,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub attempt_number: i32,
}

pub async fn insert(pool: &PgPool, f: NewFallback<'_>) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO llm_fallbacks
            (id, report_id, original_provider, fallback_provider, reason, success,
             latency_ms, prompt_tokens, completion_tokens, attempt_number, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(id)
    .bind(f.report_id)
    .bind(f.original_provider)
    .bind(f.fallback_provider)
    .bind(f.reason.as_str())
    .bind(f.success)
    .bind(f.latency_ms)
    .bind(f.prompt_tokens)
    .bind(f.completion_tokens)
    .bind(f.attempt_number)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(id)
}

/// Fallback trail for a report, in attempt order.
pub async fn list_by_report(pool: &PgPool, report_id: Uuid) -> Result<Vec<LlmFallback>> {
    let rows = sqlx::query(
        r#"
        SELECT id, report_id, original_provider, fallback_provider, reason, success,
               latency_ms, prompt_tokens, completion_tokens, attempt_number, created_at
        FROM llm_fallbacks
        WHERE report_id = $1
        ORDER BY attempt_number
        "#,
    )
    .bind(report_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_fallback).collect()
}

/// Fallback volume, tokens and latency per provider and reason since
/// `since`, limited to reports of companies owned by `user_id`.
pub async fn usage_by_reason(
    pool: &PgPool,
    user_id: Uuid,
    since: chrono::DateTime<Utc>,
) -> Result<Vec<FallbackUsage>> {
    let rows = sqlx::query(
        r#"
        SELECT f.original_provider,
               f.reason,
               COUNT(*) AS n,
               COALESCE(SUM(f.prompt_tokens), 0)::BIGINT AS prompt_tokens,
               COALESCE(SUM(f.completion_tokens), 0)::BIGINT AS completion_tokens,
               AVG(f.latency_ms)::DOUBLE PRECISION AS avg_latency_ms
        FROM llm_fallbacks f
        JOIN reports r ON r.id = f.report_id
        JOIN companies c ON c.id = r.company_id
        WHERE c.user_id = $1 AND f.created_at >= $2
        GROUP BY f.original_provider, f.reason
        ORDER BY n DESC, f.original_provider
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(FallbackUsage {
                provider: r.try_get("original_provider")?,
                reason: text_enum(&r, "reason")?,
                count: r.try_get("n")?,
                prompt_tokens: r.try_get("prompt_tokens")?,
                completion_tokens: r.try_get("completion_tokens")?,
                avg_latency_ms: r.try_get("avg_latency_ms")?,
            })
        })
        .collect()
}

fn row_to_fallback(r: PgRow) -> Result<LlmFallback> {
    Ok(LlmFallback {
        id: r.try_get("id")?,
        report_id: r.try_get("report_id")?,
        original_provider: r.try_get("original_provider")?,
        fallback_provider: r.try_get("fallback_provider")?,
        reason: text_enum(&r, "reason")?,
        success: r.try_get("success")?,
        latency_ms: r.try_get("latency_ms")?,
        prompt_tokens: r.try_get("prompt_tokens")?,
        completion_tokens: r.try_get("completion_tokens")?,
        attempt_number: r.try_get("attempt_number")?,
        created_at: r.try_get("created_at")?,
    })
}
