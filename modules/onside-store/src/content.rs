use anyhow::Result;
use chrono::Utc;
use onside_common::{ContentChange, ScrapedContent};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct NewChange<'a> {
    pub competitor_id: Uuid,
    pub url: &'a str,
    pub old_version: i32,
    pub new_version: i32,
    pub diff: &'a str,
    pub change_ratio: f64,
}

/// Latest successfully scraped version of a page. Error rows are skipped.
pub async fn latest_version(
    pool: &PgPool,
    competitor_id: Uuid,
    url: &str,
) -> Result<Option<ScrapedContent>> {
    let row = sqlx::query(
        r#"
        SELECT id, competitor_id, url, content_hash, content, version, scraped_at, error_message
        FROM scraped_content
        WHERE competitor_id = $1 AND url = $2 AND error_message IS NULL
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(competitor_id)
    .bind(url)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_content).transpose()
}

pub async fn insert_version(
    pool: &PgPool,
    competitor_id: Uuid,
    url: &str,
    content_hash: &str,
    content: &str,
    version: i32,
) -> Result<ScrapedContent> {
    let row = sqlx::query(
        r#"
        INSERT INTO scraped_content (id, competitor_id, url, content_hash, content, version, scraped_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, competitor_id, url, content_hash, content, version, scraped_at, error_message
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(competitor_id)
    .bind(url)
    .bind(content_hash)
    .bind(content)
    .bind(version)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    row_to_content(row)
}

/// Record a failed scrape. Carries the last good version number so the row sorts
/// next to it, but never counts as that version.
pub async fn insert_error(
    pool: &PgPool,
    competitor_id: Uuid,
    url: &str,
    last_version: i32,
    error_message: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO scraped_content
            (id, competitor_id, url, content_hash, content, version, scraped_at, error_message)
        VALUES ($1, $2, $3, '', '', $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(competitor_id)
    .bind(url)
    .bind(last_version)
    .bind(Utc::now())
    .bind(error_message)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_change(pool: &PgPool, change: NewChange<'_>) -> Result<ContentChange> {
    let row = sqlx::query(
        r#"
        INSERT INTO content_changes
            (id, competitor_id, url, old_version, new_version, diff, change_ratio, detected_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, competitor_id, url, old_version, new_version, diff, change_ratio, detected_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(change.competitor_id)
    .bind(change.url)
    .bind(change.old_version)
    .bind(change.new_version)
    .bind(change.diff)
    .bind(change.change_ratio)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    row_to_change(row)
}

pub async fn list_changes(
    pool: &PgPool,
    competitor_id: Uuid,
    limit: u32,
) -> Result<Vec<ContentChange>> {
    let limit = limit.min(200) as i64;
    let rows = sqlx::query(
        r#"
        SELECT id, competitor_id, url, old_version, new_version, diff, change_ratio, detected_at
        FROM content_changes
        WHERE competitor_id = $1
        ORDER BY detected_at DESC
        LIMIT $2
        "#,
    )
    .bind(competitor_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_change).collect()
}

fn row_to_content(r: PgRow) -> Result<ScrapedContent> {
    Ok(ScrapedContent {
        id: r.try_get("id")?,
        competitor_id: r.try_get("competitor_id")?,
        url: r.try_get("url")?,
        content_hash: r.try_get("content_hash")?,
        content: r.try_get("content")?,
        version: r.try_get("version")?,
        scraped_at: r.try_get("scraped_at")?,
        error_message: r.try_get("error_message")?,
    })
}

fn row_to_change(r: PgRow) -> Result<ContentChange> {
    Ok(ContentChange {
        id: r.try_get("id")?,
        competitor_id: r.try_get("competitor_id")?,
        url: r.try_get("url")?,
        old_version: r.try_get("old_version")?,
        new_version: r.try_get("new_version")?,
        diff: r.try_get("diff")?,
        change_ratio: r.try_get("change_ratio")?,
        detected_at: r.try_get("detected_at")?,
    })
}
