//! Cron-driven report schedules.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use cron::Schedule;
use onside_common::{ExecutionStatus, OnsideError, ReportSchedule, ReportStatus};
use onside_store::reports::NewReport;
use onside_store::{email, reports, schedules};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::mailer::{deliver_report, Mailer};
use crate::reports::ReportGenerator;

/// Parse a cron expression. Six or seven fields (seconds first) are taken as
/// is; classic five-field expressions run at second zero and number weekdays
/// 0-6 from Sunday, with 7 also meaning Sunday.
pub fn parse_cron(expr: &str) -> Result<Schedule, OnsideError> {
    let expr = expr.trim();
    let invalid = |e: &dyn std::fmt::Display| {
        OnsideError::Validation(format!("invalid cron expression '{expr}': {e}"))
    };
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let normalized = match fields.len() {
        5 => {
            let weekdays = classic_weekdays(fields[4]).map_err(|e| invalid(&e))?;
            format!("0 {} {weekdays}", fields[..4].join(" "))
        }
        6 | 7 => expr.to_string(),
        n => {
            return Err(OnsideError::Validation(format!(
                "cron expression must have 5 to 7 fields, got {n}"
            )))
        }
    };
    Schedule::from_str(&normalized).map_err(|e| invalid(&e))
}

/// Rewrite a classic day-of-week field (Sunday = 0 or 7) into the cron
/// crate's numbering (Sunday = 1). Numeric items are expanded into an
/// explicit list; names and wildcards pass through.
fn classic_weekdays(field: &str) -> Result<String, String> {
    let mut days = BTreeSet::new();
    let mut named = Vec::new();

    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: u32 = step.parse().map_err(|_| format!("bad step in '{item}'"))?;
                if step == 0 {
                    return Err(format!("zero step in '{item}'"));
                }
                (base, Some(step))
            }
            None => (item, None),
        };

        let wildcard = matches!(base, "*" | "?");
        if base.chars().any(|c| c.is_ascii_alphabetic()) || (wildcard && step.is_none()) {
            named.push(item.to_string());
            continue;
        }

        let (start, end) = if wildcard {
            (0, 6)
        } else if let Some((a, b)) = base.split_once('-') {
            (weekday_number(a)?, weekday_number(b)?)
        } else {
            let start = weekday_number(base)?;
            (start, if step.is_some() { 6 } else { start })
        };
        if start > end {
            return Err(format!("descending range '{base}'"));
        }
        for day in (start..=end).step_by(step.unwrap_or(1) as usize) {
            days.insert(day % 7 + 1);
        }
    }

    named.extend(days.iter().map(u32::to_string));
    Ok(named.join(","))
}

fn weekday_number(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(n) if n <= 7 => Ok(n),
        _ => Err(format!("weekday '{value}' out of range 0-7")),
    }
}

/// First fire time strictly after `after`, if the expression ever fires again.
pub fn next_run_after(
    expr: &str,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, OnsideError> {
    Ok(parse_cron(expr)?.after(&after).next())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub due: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct ScheduleRunner {
    pool: PgPool,
    generator: Arc<ReportGenerator>,
    mailer: Arc<dyn Mailer>,
    interval: Duration,
}

impl ScheduleRunner {
    pub fn new(
        pool: PgPool,
        generator: Arc<ReportGenerator>,
        mailer: Arc<dyn Mailer>,
        interval: Duration,
    ) -> Self {
        Self {
            pool,
            generator,
            mailer,
            interval,
        }
    }

    /// Run every due schedule once.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickSummary> {
        let due = schedules::list_due(&self.pool, now).await?;
        let mut summary = TickSummary {
            due: due.len(),
            ..Default::default()
        };

        for schedule in due {
            let next = match next_run_after(&schedule.cron_expression, now) {
                Ok(next) => next,
                Err(e) => {
                    warn!(schedule_id = %schedule.id, error = %e, "Unparseable cron, deactivating");
                    summary.failed += 1;
                    self.deactivate(&schedule).await;
                    continue;
                }
            };

            // A schedule with no future fire time still owes its last due
            // occurrence, unless it was never scheduled at all.
            if next.is_none() && schedule.next_run_at.is_none() {
                info!(schedule_id = %schedule.id, "Schedule never fires, deactivating");
                self.deactivate(&schedule).await;
                continue;
            }

            match self.execute(&schedule, now).await {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(schedule_id = %schedule.id, error = %e, "Schedule execution errored");
                }
            }

            if let Err(e) = schedules::record_run(&self.pool, schedule.id, now, next).await {
                error!(schedule_id = %schedule.id, error = %e, "Failed to record schedule run");
            }
            if next.is_none() {
                info!(schedule_id = %schedule.id, "Schedule never fires again, deactivating");
                self.deactivate(&schedule).await;
            }
        }

        if summary.due > 0 {
            info!(
                due = summary.due,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Scheduler tick complete"
            );
        }
        Ok(summary)
    }

    async fn deactivate(&self, schedule: &ReportSchedule) {
        if let Err(e) = schedules::set_active(&self.pool, schedule.id, false).await {
            error!(schedule_id = %schedule.id, error = %e, "Failed to deactivate schedule");
        }
    }

    /// One execution: create, generate and deliver a report. Returns whether
    /// the report completed.
    async fn execute(&self, schedule: &ReportSchedule, now: DateTime<Utc>) -> Result<bool> {
        let execution_id = schedules::start_execution(&self.pool, schedule.id).await?;
        info!(schedule_id = %schedule.id, %execution_id, "Running scheduled report");

        let outcome = self.produce(schedule, now).await;

        let (report_id, status, message) = match &outcome {
            Ok((report_id, None)) => (Some(*report_id), ExecutionStatus::Succeeded, None),
            Ok((report_id, Some(msg))) => (Some(*report_id), ExecutionStatus::Failed, Some(msg.clone())),
            Err(e) => (None, ExecutionStatus::Failed, Some(format!("{e:#}"))),
        };
        schedules::finish_execution(&self.pool, execution_id, report_id, status, message.as_deref())
            .await?;

        Ok(status == ExecutionStatus::Succeeded)
    }

    /// Returns the report id and, if generation failed, why.
    async fn produce(
        &self,
        schedule: &ReportSchedule,
        now: DateTime<Utc>,
    ) -> Result<(Uuid, Option<String>)> {
        let report = reports::create(
            &self.pool,
            NewReport {
                company_id: schedule.company_id,
                competitor_id: schedule.competitor_id,
                report_type: schedule.report_type,
                title: format!(
                    "Scheduled {} report {}",
                    schedule.report_type,
                    now.format("%Y-%m-%d")
                ),
            },
        )
        .await?;

        let report = self.generator.generate(report.id).await?;
        if report.status != ReportStatus::Completed {
            let reason = report
                .error_message
                .clone()
                .unwrap_or_else(|| format!("report ended {}", report.status));
            return Ok((report.id, Some(reason)));
        }

        let recipients = email::list_recipients(&self.pool, schedule.company_id, true).await?;
        if !recipients.is_empty() {
            deliver_report(&self.pool, self.mailer.as_ref(), &report, &recipients).await?;
        }
        Ok((report.id, None))
    }

    /// Tick on an interval until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Schedule runner started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!(error = %e, "Scheduler tick failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Schedule runner stopped");
    }
}
