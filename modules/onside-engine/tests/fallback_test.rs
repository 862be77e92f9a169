//! Fallback chain behavior against scripted providers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_client::{AiError, Completion, CompletionProvider, CompletionRequest, Usage};
use async_trait::async_trait;
use onside_common::FallbackReason;
use onside_engine::{
    AttemptRecorder, FallbackError, FallbackManager, FallbackPolicy, FallbackRecord,
};
use uuid::Uuid;

// =========================================================================
// Test doubles
// =========================================================================

enum Script {
    Answer { confidence: f64 },
    Garbage,
    Fail(fn() -> AiError),
    Hang,
}

struct ScriptedProvider {
    name: &'static str,
    script: Script,
    calls: Mutex<u32>,
}

impl ScriptedProvider {
    fn new(name: &'static str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name,
            script,
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

fn answer(confidence: f64) -> String {
    serde_json::json!({
        "reasoning": [{"step": 1, "thought": "Looked at the news."}],
        "insights": ["Something changed"],
        "summary": "A summary.",
        "confidence": confidence
    })
    .to_string()
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, AiError> {
        *self.calls.lock().unwrap() += 1;
        let text = match &self.script {
            Script::Answer { confidence } => answer(*confidence),
            Script::Garbage => "Sorry, I can't help with that.".to_string(),
            Script::Fail(make) => return Err(make()),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                answer(0.9)
            }
        };
        Ok(Completion {
            text,
            provider: self.name.to_string(),
            model: "test-model".to_string(),
            usage: Some(Usage {
                prompt_tokens: 100,
                completion_tokens: 20,
            }),
        })
    }
}

#[derive(Default)]
struct MemoryRecorder {
    records: Mutex<Vec<FallbackRecord>>,
}

impl MemoryRecorder {
    fn records(&self) -> Vec<FallbackRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttemptRecorder for MemoryRecorder {
    async fn record(&self, record: FallbackRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

struct BrokenRecorder;

#[async_trait]
impl AttemptRecorder for BrokenRecorder {
    async fn record(&self, _record: FallbackRecord) -> anyhow::Result<()> {
        anyhow::bail!("database is down")
    }
}

fn policy() -> FallbackPolicy {
    FallbackPolicy {
        max_attempts: 3,
        attempt_timeout: Duration::from_millis(200),
        min_confidence: 0.6,
    }
}

fn request() -> CompletionRequest {
    CompletionRequest::new("system", "prompt")
}

fn manager(
    providers: Vec<Arc<ScriptedProvider>>,
    policy: FallbackPolicy,
    recorder: Arc<dyn AttemptRecorder>,
) -> FallbackManager {
    let providers: Vec<Arc<dyn CompletionProvider>> = providers
        .into_iter()
        .map(|p| p as Arc<dyn CompletionProvider>)
        .collect();
    FallbackManager::new(providers, policy, recorder)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn primary_success_records_nothing() {
    let primary = ScriptedProvider::new("anthropic", Script::Answer { confidence: 0.9 });
    let backup = ScriptedProvider::new("openai", Script::Answer { confidence: 0.9 });
    let recorder = Arc::new(MemoryRecorder::default());
    let fm = manager(vec![primary.clone(), backup.clone()], policy(), recorder.clone());

    let outcome = fm.run(None, &request()).await.unwrap();

    assert_eq!(outcome.provider, "anthropic");
    assert_eq!(outcome.fallback_count, 0);
    assert_eq!(outcome.attempts.len(), 1);
    assert!(outcome.attempts[0].success);
    assert_eq!(backup.calls(), 0);
    assert!(recorder.records().is_empty());
}

#[tokio::test]
async fn error_then_success_records_one_successful_fallback() {
    let report_id = Uuid::new_v4();
    let primary = ScriptedProvider::new(
        "anthropic",
        Script::Fail(|| AiError::Api {
            status: 500,
            body: "overloaded".into(),
        }),
    );
    let backup = ScriptedProvider::new("openai", Script::Answer { confidence: 0.8 });
    let recorder = Arc::new(MemoryRecorder::default());
    let fm = manager(vec![primary, backup], policy(), recorder.clone());

    let outcome = fm.run(Some(report_id), &request()).await.unwrap();

    assert_eq!(outcome.provider, "openai");
    assert_eq!(outcome.fallback_count, 1);
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.attempts[0].reason, Some(FallbackReason::Error));

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.report_id, Some(report_id));
    assert_eq!(r.original_provider, "anthropic");
    assert_eq!(r.fallback_provider, "openai");
    assert_eq!(r.reason, FallbackReason::Error);
    assert!(r.success);
    assert_eq!(r.attempt_number, 1);
    assert_eq!(r.prompt_tokens, Some(100));
}

#[tokio::test]
async fn each_failure_reason_is_classified() {
    let chain = vec![
        ScriptedProvider::new("slow", Script::Hang),
        ScriptedProvider::new(
            "limited",
            Script::Fail(|| AiError::RateLimited { retry_after: None }),
        ),
        ScriptedProvider::new("garbled", Script::Garbage),
        ScriptedProvider::new("unsure", Script::Answer { confidence: 0.3 }),
        ScriptedProvider::new("good", Script::Answer { confidence: 0.7 }),
    ];
    let recorder = Arc::new(MemoryRecorder::default());
    let fm = manager(
        chain,
        FallbackPolicy {
            max_attempts: 5,
            ..policy()
        },
        recorder.clone(),
    );

    let outcome = fm.run(None, &request()).await.unwrap();

    assert_eq!(outcome.provider, "good");
    assert_eq!(outcome.fallback_count, 4);
    let reasons: Vec<FallbackReason> = recorder.records().iter().map(|r| r.reason).collect();
    assert_eq!(
        reasons,
        vec![
            FallbackReason::Timeout,
            FallbackReason::RateLimit,
            FallbackReason::InvalidResponse,
            FallbackReason::LowConfidence,
        ]
    );

    let low = &outcome.attempts[3];
    assert_eq!(low.confidence, Some(0.3));
    assert_eq!(low.chain_of_thought.len(), 1, "rejected reasoning is kept");
}

#[tokio::test]
async fn exhaustion_is_terminal_and_last_row_points_at_none() {
    let chain = vec![
        ScriptedProvider::new("anthropic", Script::Answer { confidence: 0.4 }),
        ScriptedProvider::new("openai", Script::Fail(|| AiError::Timeout)),
    ];
    let recorder = Arc::new(MemoryRecorder::default());
    let fm = manager(chain, policy(), recorder.clone());

    let err = fm.run(None, &request()).await.unwrap_err();

    let FallbackError::Exhausted { attempts } = &err else {
        panic!("expected exhaustion, got {err:?}");
    };
    assert_eq!(attempts.len(), 2);
    assert!(attempts.iter().all(|a| !a.success));

    let records = recorder.records();
    assert_eq!(records.len(), 2, "one row per failed attempt");
    assert_eq!(records[0].fallback_provider, "openai");
    assert!(!records[0].success);
    assert_eq!(records[1].original_provider, "openai");
    assert_eq!(records[1].fallback_provider, "none");
    assert_eq!(records[1].reason, FallbackReason::Timeout);
    assert!(!records[1].success);
}

#[tokio::test]
async fn max_attempts_bounds_the_chain() {
    let chain = vec![
        ScriptedProvider::new("a", Script::Garbage),
        ScriptedProvider::new("b", Script::Garbage),
        ScriptedProvider::new("c", Script::Answer { confidence: 0.9 }),
    ];
    let untouched = chain[2].clone();
    let recorder = Arc::new(MemoryRecorder::default());
    let fm = manager(
        chain,
        FallbackPolicy {
            max_attempts: 2,
            ..policy()
        },
        recorder.clone(),
    );

    let err = fm.run(None, &request()).await.unwrap_err();

    assert_eq!(err.attempts().len(), 2);
    assert_eq!(untouched.calls(), 0);
    let records = recorder.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].fallback_provider, "none");
}

#[tokio::test]
async fn recorder_failure_does_not_abort_chain() {
    let chain = vec![
        ScriptedProvider::new("anthropic", Script::Garbage),
        ScriptedProvider::new("openai", Script::Answer { confidence: 0.95 }),
    ];
    let fm = manager(chain, policy(), Arc::new(BrokenRecorder));

    let outcome = fm.run(None, &request()).await.unwrap();
    assert_eq!(outcome.provider, "openai");
}

#[tokio::test]
async fn no_providers_is_an_error() {
    let fm = FallbackManager::new(Vec::new(), policy(), Arc::new(MemoryRecorder::default()));
    assert!(matches!(
        fm.run(None, &request()).await,
        Err(FallbackError::NoProviders)
    ));
}
