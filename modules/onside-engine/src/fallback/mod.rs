//! Ordered provider fallback for analysis requests.
//!
//! Providers are tried in configured order. An attempt fails on timeout,
//! provider error, rate limiting, an unparseable answer, or a confidence below
//! the policy floor; the next provider is then tried until the attempt budget
//! or the provider list runs out.
//!
//! Every failed attempt leaves exactly one [`FallbackRecord`]. The record is
//! written once the following attempt concludes, so it can carry whether the
//! fallback worked and how long it took. The last failure in a chain has no
//! follow-up and is recorded against [`NO_FALLBACK_PROVIDER`].

mod recorder;

pub use recorder::{AttemptRecorder, FallbackRecord, NoopRecorder, PgRecorder};

use std::sync::Arc;
use std::time::{Duration, Instant};

use ai_client::{AiError, Completion, CompletionProvider, CompletionRequest, Usage};
use onside_common::{FallbackReason, NO_FALLBACK_PROVIDER};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::reasoning::{parse_analysis, AnalysisOutput, ReasoningStep};

#[derive(Debug, Clone, Copy)]
pub struct FallbackPolicy {
    pub max_attempts: usize,
    pub attempt_timeout: Duration,
    pub min_confidence: f64,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(60),
            min_confidence: 0.6,
        }
    }
}

impl From<&onside_common::config::LlmConfig> for FallbackPolicy {
    fn from(llm: &onside_common::config::LlmConfig) -> Self {
        Self {
            max_attempts: llm.max_attempts,
            attempt_timeout: Duration::from_secs(llm.attempt_timeout_secs),
            min_confidence: llm.min_confidence,
        }
    }
}

/// Trail entry for one attempt, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub attempt_number: u32,
    pub provider: String,
    pub model: String,
    pub reason: Option<FallbackReason>,
    pub success: bool,
    pub latency_ms: u64,
    pub confidence: Option<f64>,
    pub chain_of_thought: Vec<ReasoningStep>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub output: AnalysisOutput,
    pub provider: String,
    pub model: String,
    pub attempts: Vec<AttemptRecord>,
    /// Failed attempts before the one that succeeded.
    pub fallback_count: u32,
}

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("no LLM providers configured")]
    NoProviders,
    #[error("all {} LLM attempts failed", attempts.len())]
    Exhausted { attempts: Vec<AttemptRecord> },
}

impl FallbackError {
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            FallbackError::NoProviders => &[],
            FallbackError::Exhausted { attempts } => attempts,
        }
    }
}

/// Map a provider error onto the fallback taxonomy.
pub fn reason_for(error: &AiError) -> FallbackReason {
    match error {
        AiError::Timeout => FallbackReason::Timeout,
        AiError::RateLimited { .. } => FallbackReason::RateLimit,
        AiError::InvalidResponse(_) => FallbackReason::InvalidResponse,
        AiError::Config(_) | AiError::Api { .. } | AiError::Network(_) => FallbackReason::Error,
    }
}

/// A failed attempt waiting for its successor before it is recorded.
struct Pending {
    attempt_number: u32,
    provider: String,
    reason: FallbackReason,
    latency: Duration,
    usage: Option<Usage>,
}

struct Verdict {
    result: Result<AnalysisOutput, (FallbackReason, String)>,
    /// Parsed answer kept for the trail even when rejected for low confidence.
    rejected: Option<AnalysisOutput>,
    usage: Option<Usage>,
    model: Option<String>,
}

pub struct FallbackManager {
    providers: Vec<Arc<dyn CompletionProvider>>,
    policy: FallbackPolicy,
    recorder: Arc<dyn AttemptRecorder>,
}

impl FallbackManager {
    pub fn new(
        providers: Vec<Arc<dyn CompletionProvider>>,
        policy: FallbackPolicy,
        recorder: Arc<dyn AttemptRecorder>,
    ) -> Self {
        Self {
            providers,
            policy,
            recorder,
        }
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    /// Provider names in fallback order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn run(
        &self,
        report_id: Option<Uuid>,
        request: &CompletionRequest,
    ) -> Result<FallbackOutcome, FallbackError> {
        if self.providers.is_empty() {
            return Err(FallbackError::NoProviders);
        }

        let limit = self.policy.max_attempts.min(self.providers.len());
        let mut attempts = Vec::with_capacity(limit);
        let mut pending: Option<Pending> = None;

        for (index, provider) in self.providers.iter().take(limit).enumerate() {
            let attempt_number = index as u32 + 1;
            info!(
                provider = provider.name(),
                model = provider.model(),
                attempt = attempt_number,
                "LLM attempt"
            );

            let started = Instant::now();
            let verdict = self.attempt(provider.as_ref(), request).await;
            let latency = started.elapsed();

            if let Some(previous) = pending.take() {
                self.record(FallbackRecord {
                    report_id,
                    original_provider: previous.provider,
                    fallback_provider: provider.name().to_string(),
                    reason: previous.reason,
                    success: verdict.result.is_ok(),
                    latency_ms: latency.as_millis() as i64,
                    prompt_tokens: verdict.usage.map(|u| u.prompt_tokens as i32),
                    completion_tokens: verdict.usage.map(|u| u.completion_tokens as i32),
                    attempt_number: previous.attempt_number as i32,
                })
                .await;
            }

            let model = verdict
                .model
                .clone()
                .unwrap_or_else(|| provider.model().to_string());

            match verdict.result {
                Ok(output) => {
                    info!(
                        provider = provider.name(),
                        attempt = attempt_number,
                        confidence = output.confidence,
                        latency_ms = latency.as_millis() as u64,
                        "LLM attempt succeeded"
                    );
                    attempts.push(AttemptRecord {
                        attempt_number,
                        provider: provider.name().to_string(),
                        model: model.clone(),
                        reason: None,
                        success: true,
                        latency_ms: latency.as_millis() as u64,
                        confidence: Some(output.confidence),
                        chain_of_thought: output.reasoning.clone(),
                        error: None,
                    });
                    return Ok(FallbackOutcome {
                        output,
                        provider: provider.name().to_string(),
                        model,
                        attempts,
                        fallback_count: index as u32,
                    });
                }
                Err((reason, message)) => {
                    warn!(
                        provider = provider.name(),
                        attempt = attempt_number,
                        reason = %reason,
                        error = %message,
                        latency_ms = latency.as_millis() as u64,
                        "LLM attempt failed"
                    );
                    attempts.push(AttemptRecord {
                        attempt_number,
                        provider: provider.name().to_string(),
                        model,
                        reason: Some(reason),
                        success: false,
                        latency_ms: latency.as_millis() as u64,
                        confidence: verdict.rejected.as_ref().map(|o| o.confidence),
                        chain_of_thought: verdict
                            .rejected
                            .map(|o| o.reasoning)
                            .unwrap_or_default(),
                        error: Some(message),
                    });
                    pending = Some(Pending {
                        attempt_number,
                        provider: provider.name().to_string(),
                        reason,
                        latency,
                        usage: verdict.usage,
                    });
                }
            }
        }

        if let Some(last) = pending {
            self.record(FallbackRecord {
                report_id,
                original_provider: last.provider,
                fallback_provider: NO_FALLBACK_PROVIDER.to_string(),
                reason: last.reason,
                success: false,
                latency_ms: last.latency.as_millis() as i64,
                prompt_tokens: last.usage.map(|u| u.prompt_tokens as i32),
                completion_tokens: last.usage.map(|u| u.completion_tokens as i32),
                attempt_number: last.attempt_number as i32,
            })
            .await;
        }

        warn!(attempts = attempts.len(), "LLM providers exhausted");
        Err(FallbackError::Exhausted { attempts })
    }

    async fn attempt(&self, provider: &dyn CompletionProvider, request: &CompletionRequest) -> Verdict {
        let completion: Completion =
            match tokio::time::timeout(self.policy.attempt_timeout, provider.complete(request)).await
            {
                Err(_) => {
                    return Verdict {
                        result: Err((
                            FallbackReason::Timeout,
                            format!("no response within {:?}", self.policy.attempt_timeout),
                        )),
                        rejected: None,
                        usage: None,
                        model: None,
                    }
                }
                Ok(Err(e)) => {
                    return Verdict {
                        result: Err((reason_for(&e), e.to_string())),
                        rejected: None,
                        usage: None,
                        model: None,
                    }
                }
                Ok(Ok(completion)) => completion,
            };

        let usage = completion.usage;
        let model = Some(completion.model);

        match parse_analysis(&completion.text) {
            Err(e) => Verdict {
                result: Err((FallbackReason::InvalidResponse, e.to_string())),
                rejected: None,
                usage,
                model,
            },
            Ok(output) if output.confidence < self.policy.min_confidence => Verdict {
                result: Err((
                    FallbackReason::LowConfidence,
                    format!(
                        "confidence {:.2} below {:.2}",
                        output.confidence, self.policy.min_confidence
                    ),
                )),
                rejected: Some(output),
                usage,
                model,
            },
            Ok(output) => Verdict {
                result: Ok(output),
                rejected: None,
                usage,
                model,
            },
        }
    }

    async fn record(&self, record: FallbackRecord) {
        let provider = record.original_provider.clone();
        if let Err(e) = self.recorder.record(record).await {
            warn!(error = %e, provider = %provider, "Failed to record LLM fallback");
        }
    }
}
