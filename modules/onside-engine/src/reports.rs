//! Report generation, rendering and export.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use onside_common::{Company, Competitor, Domain, OnsideError, Report, ReportStatus, ReportType};
use onside_store::reports::ReportCompletion;
use onside_store::{companies, competitors, domains, reports};
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::fallback::{FallbackError, FallbackManager};
use crate::gather::{gather, GatherContext, Sources};
use crate::reasoning::{build_completion, AnalysisRequest};

pub struct ReportGenerator {
    pool: PgPool,
    fallback: Arc<FallbackManager>,
    sources: Sources,
    temperature: f32,
}

/// Why generation stopped, and how many providers were burned getting there.
struct Failure {
    message: String,
    fallback_count: i32,
}

impl From<anyhow::Error> for Failure {
    fn from(e: anyhow::Error) -> Self {
        Self {
            message: format!("{e:#}"),
            fallback_count: 0,
        }
    }
}

impl ReportGenerator {
    pub fn new(
        pool: PgPool,
        fallback: Arc<FallbackManager>,
        sources: Sources,
        temperature: f32,
    ) -> Self {
        Self {
            pool,
            fallback,
            sources,
            temperature,
        }
    }

    /// Generate a pending report end to end. The report ends `completed` or
    /// `failed`; an `Err` here means it could not be claimed or persisted.
    pub async fn generate(&self, report_id: Uuid) -> Result<Report> {
        let report = reports::find_by_id(&self.pool, report_id)
            .await?
            .ok_or_else(|| OnsideError::not_found(format!("report {report_id}")))?;

        if !reports::mark_processing(&self.pool, report_id).await? {
            anyhow::bail!(
                "report {report_id} is {}, only pending reports can be generated",
                report.status
            );
        }
        info!(%report_id, report_type = %report.report_type, "Generating report");

        match self.analyze(&report).await {
            Ok(done) => {
                info!(
                    %report_id,
                    provider = done.provider_used.as_str(),
                    fallback_count = done.fallback_count,
                    "Report completed"
                );
                reports::complete(&self.pool, report_id, done).await?;
            }
            Err(failure) => {
                warn!(%report_id, error = failure.message.as_str(), "Report failed");
                reports::fail(
                    &self.pool,
                    report_id,
                    &failure.message,
                    failure.fallback_count,
                )
                .await?;
            }
        }

        reports::find_by_id(&self.pool, report_id)
            .await?
            .ok_or_else(|| OnsideError::not_found(format!("report {report_id}")).into())
    }

    async fn analyze(&self, report: &Report) -> Result<ReportCompletion, Failure> {
        let company = companies::find_by_id(&self.pool, report.company_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("company {} no longer exists", report.company_id))?;

        let (competitor, competitor_domains) = match report.competitor_id {
            Some(id) => {
                let competitor = competitors::find_by_id(&self.pool, id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("competitor {id} no longer exists"))?;
                let domains = domains::list_for_competitor(&self.pool, id).await?;
                (Some(competitor), domains)
            }
            None => (None, Vec::new()),
        };

        let ctx = gather_context(
            report.report_type,
            &company,
            competitor.as_ref(),
            &competitor_domains,
        );
        let gathered = gather(&self.sources, &ctx).await;

        let request = AnalysisRequest {
            kind: report.report_type,
            subject: ctx.subject.clone(),
            context: json!({
                "company": company_json(&company),
                "competitor": competitor.as_ref().map(competitor_json),
                "sources": gathered.context_json(),
            }),
            instructions: None,
        };
        let completion = build_completion(&request, self.temperature);

        let outcome = self
            .fallback
            .run(Some(report.id), &completion)
            .await
            .map_err(|e| Failure {
                message: describe_failure(&e),
                fallback_count: e.attempts().len() as i32,
            })?;

        let content = json!({
            "summary": outcome.output.summary,
            "insights": outcome.output.insights,
            "sources": gathered.statuses(),
            "data": gathered.context_json(),
            "attempts": outcome.attempts,
            "model": outcome.model,
        });

        Ok(ReportCompletion {
            content,
            chain_of_thought: json!(outcome.output.reasoning),
            confidence_score: outcome.output.confidence,
            fallback_count: outcome.fallback_count as i32,
            provider_used: outcome.provider,
        })
    }
}

fn describe_failure(error: &FallbackError) -> String {
    let attempts = error.attempts();
    if attempts.is_empty() {
        return error.to_string();
    }
    let trail: Vec<String> = attempts
        .iter()
        .map(|a| match a.reason {
            Some(reason) => format!("{} ({reason})", a.provider),
            None => a.provider.clone(),
        })
        .collect();
    format!("{error}: {}", trail.join(", "))
}

fn company_json(company: &Company) -> Value {
    json!({
        "name": company.name,
        "domain": company.domain,
        "industry": company.industry,
        "description": company.description,
    })
}

fn competitor_json(competitor: &Competitor) -> Value {
    json!({
        "name": competitor.name,
        "domain": competitor.domain,
        "description": competitor.description,
    })
}

/// Bare domains get an https scheme.
pub fn normalize_website(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}

/// Decide what to search for and which site to score.
pub fn gather_context(
    kind: ReportType,
    company: &Company,
    competitor: Option<&Competitor>,
    competitor_domains: &[Domain],
) -> GatherContext {
    let subject = match (kind, competitor) {
        (ReportType::Competitor, Some(c)) => c.name.clone(),
        (ReportType::Market, _) => company
            .industry
            .clone()
            .unwrap_or_else(|| company.name.clone()),
        _ => company.name.clone(),
    };

    let competitor_site = competitor_domains
        .iter()
        .find(|d| d.is_primary)
        .or_else(|| competitor_domains.first())
        .map(|d| d.url.clone())
        .or_else(|| competitor.and_then(|c| c.domain.clone()));

    let website = match kind {
        ReportType::Competitor => competitor_site.or_else(|| company.domain.clone()),
        _ => company.domain.clone(),
    }
    .map(|w| normalize_website(&w));

    let industry = match kind {
        ReportType::Market => None,
        _ => company.industry.clone(),
    };

    GatherContext {
        subject,
        industry,
        website,
    }
}

// =============================================================================
// Rendering & export
// =============================================================================

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Markdown body used for email delivery.
pub fn render_text(report: &Report) -> String {
    let mut out = format!("# {}\n\n", report.title);
    out.push_str(&format!(
        "**Type:** {} | **Status:** {} | **Created:** {}\n\n",
        report.report_type,
        report.status,
        report.created_at.format("%Y-%m-%d %H:%M UTC")
    ));

    if report.status == ReportStatus::Failed {
        out.push_str(&format!(
            "Report generation failed: {}\n",
            report.error_message.as_deref().unwrap_or("unknown error")
        ));
        return out;
    }

    let Some(content) = report.content.as_ref() else {
        out.push_str("This report has not been generated yet.\n");
        return out;
    };

    if let Some(summary) = content.get("summary").and_then(Value::as_str) {
        out.push_str("## Summary\n\n");
        out.push_str(summary);
        out.push_str("\n\n");
    }

    let insights = string_list(content.get("insights"));
    if !insights.is_empty() {
        out.push_str("## Key insights\n\n");
        for insight in &insights {
            out.push_str(&format!("- {insight}\n"));
        }
        out.push('\n');
    }

    if let Some(steps) = report.chain_of_thought.as_ref().and_then(Value::as_array) {
        if !steps.is_empty() {
            out.push_str("## Reasoning\n\n");
            for (i, step) in steps.iter().enumerate() {
                let thought = step.get("thought").and_then(Value::as_str).unwrap_or("");
                out.push_str(&format!("{}. {thought}\n", i + 1));
            }
            out.push('\n');
        }
    }

    if let Some(sources) = content.get("sources").and_then(Value::as_object) {
        out.push_str("## Sources\n\n");
        for (name, status) in sources {
            out.push_str(&format!("- {name}: {}\n", status.as_str().unwrap_or("unknown")));
        }
        out.push('\n');
    }

    let mut footer = Vec::new();
    if let Some(confidence) = report.confidence_score {
        footer.push(format!("Confidence: {:.0}%", confidence * 100.0));
    }
    if let Some(provider) = &report.provider_used {
        footer.push(format!("Provider: {provider}"));
    }
    footer.push(format!("Fallbacks: {}", report.fallback_count));
    out.push_str(&footer.join(" | "));
    out.push('\n');
    out
}

/// Write `<report_id>.json` into `dir` and return its path.
pub async fn export_json(report: &Report, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create export dir {}", dir.display()))?;
    let path = dir.join(format!("{}.json", report.id));
    let body = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(report_id = %report.id, path = %path.display(), "Report exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn company() -> Company {
        Company {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Acme".into(),
            domain: Some("acme.test".into()),
            industry: Some("Widgets".into()),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn competitor(company_id: Uuid) -> Competitor {
        Competitor {
            id: Uuid::new_v4(),
            company_id,
            name: "Rival".into(),
            domain: Some("rival.test".into()),
            description: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn domain(competitor_id: Uuid, url: &str, is_primary: bool) -> Domain {
        Domain {
            id: Uuid::new_v4(),
            company_id: None,
            competitor_id: Some(competitor_id),
            url: url.into(),
            is_primary,
            created_at: Utc::now(),
        }
    }

    fn completed_report() -> Report {
        Report {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            competitor_id: None,
            report_type: ReportType::Competitor,
            status: ReportStatus::Completed,
            title: "Rival deep dive".into(),
            content: Some(json!({
                "summary": "Rival is moving downmarket.",
                "insights": ["New budget tier", "Hiring in sales"],
                "sources": {"news": "ok", "search": "failed: 503"}
            })),
            chain_of_thought: Some(json!([
                {"step": 1, "thought": "Pricing page changed."},
                {"step": 2, "thought": "Press coverage confirms it."}
            ])),
            confidence_score: Some(0.82),
            fallback_count: 1,
            provider_used: Some("openai".into()),
            error_message: None,
            created_at: Utc::now(),
            completed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn competitor_context_prefers_primary_domain() {
        let company = company();
        let rival = competitor(company.id);
        let domains = vec![
            domain(rival.id, "https://blog.rival.test", false),
            domain(rival.id, "rival.test/home", true),
        ];

        let ctx = gather_context(ReportType::Competitor, &company, Some(&rival), &domains);
        assert_eq!(ctx.subject, "Rival");
        assert_eq!(ctx.website.as_deref(), Some("https://rival.test/home"));
        assert_eq!(ctx.industry.as_deref(), Some("Widgets"));
    }

    #[test]
    fn market_context_searches_the_industry() {
        let company = company();
        let ctx = gather_context(ReportType::Market, &company, None, &[]);
        assert_eq!(ctx.subject, "Widgets");
        assert!(ctx.industry.is_none());
        assert_eq!(ctx.website.as_deref(), Some("https://acme.test"));
    }

    #[test]
    fn renders_completed_report() {
        let text = render_text(&completed_report());
        assert!(text.starts_with("# Rival deep dive"));
        assert!(text.contains("## Summary\n\nRival is moving downmarket."));
        assert!(text.contains("- New budget tier"));
        assert!(text.contains("2. Press coverage confirms it."));
        assert!(text.contains("- search: failed: 503"));
        assert!(text.contains("Confidence: 82% | Provider: openai | Fallbacks: 1"));
    }

    #[test]
    fn renders_failure_reason() {
        let mut report = completed_report();
        report.status = ReportStatus::Failed;
        report.error_message = Some("all 3 LLM attempts failed".into());

        let text = render_text(&report);
        assert!(text.contains("Report generation failed: all 3 LLM attempts failed"));
        assert!(!text.contains("## Summary"));
    }

    #[tokio::test]
    async fn exports_json_named_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let report = completed_report();

        let path = export_json(&report, &dir.path().join("exports")).await.unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("{}.json", report.id)
        );
        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["title"], "Rival deep dive");
        assert_eq!(written["status"], "completed");
    }
}
