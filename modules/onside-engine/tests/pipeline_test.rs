//! Report pipeline against Postgres with scripted LLM providers.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_client::{AiError, Completion, CompletionProvider, CompletionRequest};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use onside_common::{
    Company, DeliveryStatus, ExecutionStatus, FallbackReason, ReportStatus, ReportType,
};
use onside_engine::{
    deliver_report, FallbackManager, FallbackPolicy, Mailer, PgRecorder, ReportGenerator,
    ScheduleRunner, Sources,
};
use onside_store::{companies, email, fallbacks, reports, schedules, users};
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    onside_store::migrate(&pool).await.ok()?;
    Some(pool)
}

async fn seed_company(pool: &PgPool) -> Company {
    let user = users::create(pool, &format!("{}@example.com", Uuid::new_v4()), "hash", None)
        .await
        .unwrap();
    companies::create(
        pool,
        companies::NewCompany {
            user_id: user.id,
            name: "Acme".into(),
            domain: None,
            industry: Some("Widgets".into()),
            description: None,
        },
    )
    .await
    .unwrap()
}

/// Fails with a 500 or answers, per construction.
struct FixedProvider {
    name: &'static str,
    healthy: bool,
}

#[async_trait]
impl CompletionProvider for FixedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, AiError> {
        if !self.healthy {
            return Err(AiError::Api {
                status: 500,
                body: "overloaded".into(),
            });
        }
        Ok(Completion {
            text: serde_json::json!({
                "reasoning": [{"step": 1, "thought": "Market is growing."}],
                "insights": ["Demand is up"],
                "summary": "Widgets are booming.",
                "confidence": 0.9
            })
            .to_string(),
            provider: self.name.into(),
            model: "fixed".into(),
            usage: None,
        })
    }
}

/// Records sends; fails for addresses containing "bounce".
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
        if to.contains("bounce") {
            anyhow::bail!("mailbox unavailable");
        }
        self.sent.lock().unwrap().push(to.to_string());
        Ok(())
    }
}

fn generator(pool: &PgPool, healthy_primary: bool) -> Arc<ReportGenerator> {
    let providers: Vec<Arc<dyn CompletionProvider>> = vec![
        Arc::new(FixedProvider {
            name: "anthropic",
            healthy: healthy_primary,
        }),
        Arc::new(FixedProvider {
            name: "openai",
            healthy: true,
        }),
    ];
    let fallback = Arc::new(FallbackManager::new(
        providers,
        FallbackPolicy::default(),
        Arc::new(PgRecorder::new(pool.clone())),
    ));
    Arc::new(ReportGenerator::new(
        pool.clone(),
        fallback,
        Sources::default(),
        0.2,
    ))
}

#[tokio::test]
async fn generation_falls_back_and_persists_trail() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company = seed_company(&pool).await;
    let report = reports::create(
        &pool,
        reports::NewReport {
            company_id: company.id,
            competitor_id: None,
            report_type: ReportType::Market,
            title: "Widget market".into(),
        },
    )
    .await
    .unwrap();

    let done = generator(&pool, false).generate(report.id).await.unwrap();

    assert_eq!(done.status, ReportStatus::Completed);
    assert_eq!(done.provider_used.as_deref(), Some("openai"));
    assert_eq!(done.fallback_count, 1);
    assert_eq!(done.confidence_score, Some(0.9));
    assert_eq!(done.content.as_ref().unwrap()["summary"], "Widgets are booming.");
    assert_eq!(done.chain_of_thought.as_ref().unwrap()[0]["step"], 1);

    let trail = fallbacks::list_by_report(&pool, report.id).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].original_provider, "anthropic");
    assert_eq!(trail[0].fallback_provider, "openai");
    assert_eq!(trail[0].reason, FallbackReason::Error);
    assert!(trail[0].success);

    // A finished report cannot be generated again.
    assert!(generator(&pool, true).generate(report.id).await.is_err());
}

#[tokio::test]
async fn delivery_failure_is_isolated_per_recipient() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company = seed_company(&pool).await;
    let report = reports::create(
        &pool,
        reports::NewReport {
            company_id: company.id,
            competitor_id: None,
            report_type: ReportType::Audience,
            title: "Audience".into(),
        },
    )
    .await
    .unwrap();
    let report = generator(&pool, true).generate(report.id).await.unwrap();

    email::add_recipient(&pool, company.id, "bounce@acme.test", None)
        .await
        .unwrap();
    email::add_recipient(&pool, company.id, "ceo@acme.test", None)
        .await
        .unwrap();
    let recipients = email::list_recipients(&pool, company.id, true).await.unwrap();

    let mailer = RecordingMailer::default();
    let summary = deliver_report(&pool, &mailer, &report, &recipients)
        .await
        .unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(*mailer.sent.lock().unwrap(), vec!["ceo@acme.test".to_string()]);

    let deliveries = email::list_deliveries(&pool, report.id).await.unwrap();
    assert_eq!(deliveries.len(), 2);
    let failed = deliveries
        .iter()
        .find(|d| d.status == DeliveryStatus::Failed)
        .unwrap();
    assert!(failed
        .error_message
        .as_deref()
        .unwrap()
        .contains("mailbox unavailable"));
}

#[tokio::test]
async fn scheduler_tick_runs_due_schedule_and_advances_it() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company = seed_company(&pool).await;
    let now = Utc::now();
    let schedule = schedules::create(
        &pool,
        schedules::NewSchedule {
            company_id: company.id,
            competitor_id: None,
            report_type: ReportType::Market,
            cron_expression: "0 9 * * *".into(),
            next_run_at: Some(now - chrono::Duration::minutes(5)),
        },
    )
    .await
    .unwrap();

    let runner = ScheduleRunner::new(
        pool.clone(),
        generator(&pool, true),
        Arc::new(RecordingMailer::default()),
        Duration::from_secs(60),
    );
    let summary = runner.tick(now).await.unwrap();
    assert!(summary.succeeded >= 1);

    let history = schedules::list_executions(&pool, schedule.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ExecutionStatus::Succeeded);
    let report_id = history[0].report_id.unwrap();
    let report = reports::find_by_id(&pool, report_id).await.unwrap().unwrap();
    assert_eq!(report.status, ReportStatus::Completed);

    // No longer due at the same instant.
    let due: Vec<Uuid> = schedules::list_due(&pool, now)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert!(!due.contains(&schedule.id));
}

fn runner(pool: &PgPool) -> ScheduleRunner {
    ScheduleRunner::new(
        pool.clone(),
        generator(pool, true),
        Arc::new(RecordingMailer::default()),
        Duration::from_secs(60),
    )
}

async fn seed_schedule(
    pool: &PgPool,
    company_id: Uuid,
    cron: &str,
    next_run_at: Option<chrono::DateTime<Utc>>,
) -> Uuid {
    schedules::create(
        pool,
        schedules::NewSchedule {
            company_id,
            competitor_id: None,
            report_type: ReportType::Market,
            cron_expression: cron.into(),
            next_run_at,
        },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn expired_schedule_runs_its_last_occurrence_then_deactivates() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company = seed_company(&pool).await;
    let last_fire = Utc.with_ymd_and_hms(2024, 12, 31, 9, 0, 0).unwrap();
    let id = seed_schedule(&pool, company.id, "0 0 9 * * * 2024", Some(last_fire)).await;

    let now = Utc::now();
    runner(&pool).tick(now).await.unwrap();

    let stored = schedules::list_by_company(&pool, company.id).await.unwrap();
    assert!(!stored[0].is_active);
    assert_eq!(stored[0].next_run_at, None);
    assert_eq!(
        schedules::list_executions(&pool, id, 10).await.unwrap().len(),
        1
    );

    let due: Vec<Uuid> = schedules::list_due(&pool, now + chrono::Duration::hours(1))
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert!(!due.contains(&id));
}

#[tokio::test]
async fn expired_schedule_without_a_pending_run_never_executes() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company = seed_company(&pool).await;
    let id = seed_schedule(&pool, company.id, "0 0 9 * * * 2024", None).await;

    runner(&pool).tick(Utc::now()).await.unwrap();

    let stored = schedules::list_by_company(&pool, company.id).await.unwrap();
    assert!(!stored[0].is_active);
    assert!(schedules::list_executions(&pool, id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn broken_cron_is_deactivated_without_running() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company = seed_company(&pool).await;
    let now = Utc::now();
    let id = seed_schedule(
        &pool,
        company.id,
        "not a cron",
        Some(now - chrono::Duration::minutes(1)),
    )
    .await;

    runner(&pool).tick(now).await.unwrap();

    let stored = schedules::list_by_company(&pool, company.id).await.unwrap();
    assert!(!stored[0].is_active);
    assert!(schedules::list_executions(&pool, id, 10).await.unwrap().is_empty());
    assert!(reports::list_by_company(&pool, company.id, 10)
        .await
        .unwrap()
        .is_empty());
}
