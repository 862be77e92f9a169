use anyhow::Result;
use chrono::Utc;
use onside_common::Domain;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub async fn add_for_competitor(
    pool: &PgPool,
    competitor_id: Uuid,
    url: &str,
    is_primary: bool,
) -> Result<Domain> {
    let row = sqlx::query(
        r#"
        INSERT INTO domains (id, company_id, competitor_id, url, is_primary, created_at)
        VALUES ($1, NULL, $2, $3, $4, $5)
        RETURNING id, company_id, competitor_id, url, is_primary, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(competitor_id)
    .bind(url)
    .bind(is_primary)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    row_to_domain(row)
}

pub async fn list_for_competitor(pool: &PgPool, competitor_id: Uuid) -> Result<Vec<Domain>> {
    let rows = sqlx::query(
        r#"
        SELECT id, company_id, competitor_id, url, is_primary, created_at
        FROM domains
        WHERE competitor_id = $1
        ORDER BY is_primary DESC, created_at
        "#,
    )
    .bind(competitor_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_domain).collect()
}

fn row_to_domain(r: PgRow) -> Result<Domain> {
    Ok(Domain {
        id: r.try_get("id")?,
        company_id: r.try_get("company_id")?,
        competitor_id: r.try_get("competitor_id")?,
        url: r.try_get("url")?,
        is_primary: r.try_get("is_primary")?,
        created_at: r.try_get("created_at")?,
    })
}
