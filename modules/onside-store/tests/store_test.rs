//! Integration tests for the Postgres store.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::{Duration, Utc};
use onside_common::{
    DeliveryStatus, ExecutionStatus, FallbackReason, ReportStatus, ReportType, User,
};
use onside_store::{
    companies, competitors, content, email, fallbacks, reports, schedules, users,
};
use sqlx::PgPool;
use uuid::Uuid;

/// Get a migrated test database pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    onside_store::migrate(&pool).await.ok()?;
    Some(pool)
}

async fn seed_user(pool: &PgPool) -> User {
    let email = format!("{}@example.com", Uuid::new_v4());
    users::create(pool, &email, "hash", Some("Tester")).await.unwrap()
}

async fn seed_company(pool: &PgPool, user_id: Uuid) -> onside_common::Company {
    companies::create(
        pool,
        companies::NewCompany {
            user_id,
            name: "Acme".into(),
            domain: Some("acme.test".into()),
            industry: Some("Widgets".into()),
            description: None,
        },
    )
    .await
    .unwrap()
}

// =========================================================================
// Accounts & ownership
// =========================================================================

#[tokio::test]
async fn email_lookup_is_case_insensitive() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = seed_user(&pool).await;

    let found = users::find_by_email(&pool, &user.email.to_uppercase())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, user.id);
}

#[tokio::test]
async fn duplicate_email_is_unique_violation() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = seed_user(&pool).await;

    let err = users::create(&pool, &user.email, "hash", None)
        .await
        .unwrap_err();
    assert!(onside_store::is_unique_violation(&err));
}

#[tokio::test]
async fn company_is_invisible_to_other_users() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let owner = seed_user(&pool).await;
    let stranger = seed_user(&pool).await;
    let company = seed_company(&pool, owner.id).await;

    assert!(companies::find_owned(&pool, company.id, owner.id)
        .await
        .unwrap()
        .is_some());
    assert!(companies::find_owned(&pool, company.id, stranger.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn partial_update_keeps_untouched_columns() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let owner = seed_user(&pool).await;
    let company = seed_company(&pool, owner.id).await;

    let updated = companies::update(
        &pool,
        company.id,
        companies::CompanyUpdate {
            industry: Some("Gadgets".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(updated.name, "Acme");
    assert_eq!(updated.industry.as_deref(), Some("Gadgets"));
}

// =========================================================================
// Reports & fallbacks
// =========================================================================

#[tokio::test]
async fn report_lifecycle_and_fallback_trail() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let owner = seed_user(&pool).await;
    let company = seed_company(&pool, owner.id).await;

    let report = reports::create(
        &pool,
        reports::NewReport {
            company_id: company.id,
            competitor_id: None,
            report_type: ReportType::Market,
            title: "Market overview".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(report.status, ReportStatus::Pending);

    assert!(reports::mark_processing(&pool, report.id).await.unwrap());
    assert!(
        !reports::mark_processing(&pool, report.id).await.unwrap(),
        "second claim must fail"
    );

    for (n, (from, to, reason, ok)) in [
        ("anthropic", "openai", FallbackReason::Timeout, false),
        ("openai", "openrouter", FallbackReason::RateLimit, true),
    ]
    .into_iter()
    .enumerate()
    {
        fallbacks::insert(
            &pool,
            fallbacks::NewFallback {
                report_id: Some(report.id),
                original_provider: from,
                fallback_provider: to,
                reason,
                success: ok,
                latency_ms: 120,
                prompt_tokens: None,
                completion_tokens: None,
                attempt_number: n as i32 + 1,
            },
        )
        .await
        .unwrap();
    }

    reports::complete(
        &pool,
        report.id,
        reports::ReportCompletion {
            content: serde_json::json!({"summary": "ok"}),
            chain_of_thought: serde_json::json!([]),
            confidence_score: 0.8,
            fallback_count: 2,
            provider_used: "openrouter".into(),
        },
    )
    .await
    .unwrap();

    let done = reports::find_by_id(&pool, report.id).await.unwrap().unwrap();
    assert_eq!(done.status, ReportStatus::Completed);
    assert_eq!(done.fallback_count, 2);
    assert!(done.completed_at.is_some());

    let trail = fallbacks::list_by_report(&pool, report.id).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].original_provider, "anthropic");
    assert_eq!(trail[1].reason, FallbackReason::RateLimit);
    assert!(trail[1].success);
}

async fn seed_report(pool: &PgPool, company_id: Uuid) -> Uuid {
    reports::create(
        pool,
        reports::NewReport {
            company_id,
            competitor_id: None,
            report_type: ReportType::Market,
            title: "Usage".into(),
        },
    )
    .await
    .unwrap()
    .id
}

async fn seed_fallback(
    pool: &PgPool,
    report_id: Uuid,
    provider: &str,
    reason: FallbackReason,
    latency_ms: i64,
    tokens: (i32, i32),
) {
    fallbacks::insert(
        pool,
        fallbacks::NewFallback {
            report_id: Some(report_id),
            original_provider: provider,
            fallback_provider: "openai",
            reason,
            success: true,
            latency_ms,
            prompt_tokens: Some(tokens.0),
            completion_tokens: Some(tokens.1),
            attempt_number: 1,
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn fallback_usage_is_scoped_to_owner() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let owner = seed_user(&pool).await;
    let stranger = seed_user(&pool).await;
    let mine = seed_report(&pool, seed_company(&pool, owner.id).await.id).await;
    let theirs = seed_report(&pool, seed_company(&pool, stranger.id).await.id).await;

    seed_fallback(&pool, mine, "anthropic", FallbackReason::Timeout, 100, (10, 5)).await;
    seed_fallback(&pool, mine, "anthropic", FallbackReason::Timeout, 300, (20, 7)).await;
    seed_fallback(&pool, mine, "openrouter", FallbackReason::Error, 50, (1, 1)).await;
    seed_fallback(&pool, theirs, "anthropic", FallbackReason::Timeout, 900, (500, 500)).await;

    let since = Utc::now() - Duration::days(1);
    let usage = fallbacks::usage_by_reason(&pool, owner.id, since)
        .await
        .unwrap();

    assert_eq!(usage.len(), 2);
    let timeouts = &usage[0];
    assert_eq!(timeouts.provider, "anthropic");
    assert_eq!(timeouts.reason, FallbackReason::Timeout);
    assert_eq!(timeouts.count, 2);
    assert_eq!(timeouts.prompt_tokens, 30);
    assert_eq!(timeouts.completion_tokens, 12);
    assert_eq!(timeouts.avg_latency_ms, 200.0);
    assert_eq!(usage[1].provider, "openrouter");
    assert_eq!(usage[1].count, 1);

    let theirs = fallbacks::usage_by_reason(&pool, stranger.id, since)
        .await
        .unwrap();
    assert_eq!(theirs.len(), 1);
    assert_eq!(theirs[0].prompt_tokens, 500);
}

// =========================================================================
// Schedules
// =========================================================================

#[tokio::test]
async fn due_schedules_and_execution_history() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let owner = seed_user(&pool).await;
    let company = seed_company(&pool, owner.id).await;
    let now = Utc::now();

    let due = schedules::create(
        &pool,
        schedules::NewSchedule {
            company_id: company.id,
            competitor_id: None,
            report_type: ReportType::Market,
            cron_expression: "0 0 9 * * *".into(),
            next_run_at: Some(now - Duration::minutes(1)),
        },
    )
    .await
    .unwrap();
    let later = schedules::create(
        &pool,
        schedules::NewSchedule {
            company_id: company.id,
            competitor_id: None,
            report_type: ReportType::Audience,
            cron_expression: "0 0 9 * * *".into(),
            next_run_at: Some(now + Duration::hours(1)),
        },
    )
    .await
    .unwrap();

    let ids: Vec<Uuid> = schedules::list_due(&pool, now)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert!(ids.contains(&due.id));
    assert!(!ids.contains(&later.id));

    let exec = schedules::start_execution(&pool, due.id).await.unwrap();
    schedules::finish_execution(&pool, exec, None, ExecutionStatus::Failed, Some("boom"))
        .await
        .unwrap();
    schedules::record_run(&pool, due.id, now, Some(now + Duration::days(1)))
        .await
        .unwrap();

    let history = schedules::list_executions(&pool, due.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ExecutionStatus::Failed);
    assert_eq!(history[0].error_message.as_deref(), Some("boom"));

    let ids: Vec<Uuid> = schedules::list_due(&pool, now)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert!(!ids.contains(&due.id), "recorded run pushes next_run_at forward");
}

// =========================================================================
// Content & email
// =========================================================================

#[tokio::test]
async fn latest_version_skips_error_rows() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let owner = seed_user(&pool).await;
    let company = seed_company(&pool, owner.id).await;
    let competitor = competitors::create(
        &pool,
        competitors::NewCompetitor {
            company_id: company.id,
            name: "Rival".into(),
            domain: None,
            description: None,
        },
    )
    .await
    .unwrap();
    let url = "https://rival.test/pricing";

    content::insert_version(&pool, competitor.id, url, "abc", "v1", 1)
        .await
        .unwrap();
    content::insert_error(&pool, competitor.id, url, 1, "HTTP 503")
        .await
        .unwrap();

    let latest = content::latest_version(&pool, competitor.id, url)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.version, 1);
    assert_eq!(latest.content, "v1");
    assert!(latest.error_message.is_none());
}

#[tokio::test]
async fn delivery_status_transitions() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let owner = seed_user(&pool).await;
    let company = seed_company(&pool, owner.id).await;
    let report = reports::create(
        &pool,
        reports::NewReport {
            company_id: company.id,
            competitor_id: None,
            report_type: ReportType::Market,
            title: "Weekly".into(),
        },
    )
    .await
    .unwrap();

    let a = email::add_recipient(&pool, company.id, "a@example.com", None)
        .await
        .unwrap();
    let b = email::add_recipient(&pool, company.id, "b@example.com", Some("B"))
        .await
        .unwrap();

    let da = email::create_delivery(&pool, a.id, report.id).await.unwrap();
    let db = email::create_delivery(&pool, b.id, report.id).await.unwrap();
    email::mark_sent(&pool, da).await.unwrap();
    email::mark_failed(&pool, db, "mailbox full").await.unwrap();

    let deliveries = email::list_deliveries(&pool, report.id).await.unwrap();
    let sent = deliveries.iter().find(|d| d.id == da).unwrap();
    let failed = deliveries.iter().find(|d| d.id == db).unwrap();
    assert_eq!(sent.status, DeliveryStatus::Sent);
    assert!(sent.sent_at.is_some());
    assert_eq!(failed.status, DeliveryStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("mailbox full"));
}
