use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OnsideError;

// --- Enums ---

/// Enums persisted as TEXT columns. `as_str` is the stored form and must stay
/// in sync with the CHECK constraints in the migrations.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = OnsideError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(OnsideError::Validation(format!(
                        "unknown {} value: {other}",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Competitor,
    Market,
    Audience,
}

text_enum!(ReportType {
    Competitor => "competitor",
    Market => "market",
    Audience => "audience",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

text_enum!(ReportStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

impl ReportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::Failed)
    }
}

/// Why an LLM attempt was abandoned in favour of the next provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Timeout,
    Error,
    LowConfidence,
    InvalidResponse,
    RateLimit,
}

text_enum!(FallbackReason {
    Timeout => "timeout",
    Error => "error",
    LowConfidence => "low_confidence",
    InvalidResponse => "invalid_response",
    RateLimit => "rate_limit",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
}

text_enum!(ExecutionStatus {
    Running => "running",
    Succeeded => "succeeded",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

text_enum!(DeliveryStatus {
    Pending => "pending",
    Sent => "sent",
    Failed => "failed",
});

// --- Accounts ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// --- Companies & competitors ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competitor {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub competitor_id: Option<Uuid>,
    pub url: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

// --- Reports ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub company_id: Uuid,
    pub competitor_id: Option<Uuid>,
    pub report_type: ReportType,
    pub status: ReportStatus,
    pub title: String,
    pub content: Option<serde_json::Value>,
    pub chain_of_thought: Option<serde_json::Value>,
    pub confidence_score: Option<f64>,
    pub fallback_count: i32,
    pub provider_used: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Audit row for one abandoned LLM attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmFallback {
    pub id: Uuid,
    pub report_id: Option<Uuid>,
    pub original_provider: String,
    pub fallback_provider: String,
    pub reason: FallbackReason,
    pub success: bool,
    pub latency_ms: i64,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub attempt_number: i32,
    pub created_at: DateTime<Utc>,
}

/// Fallback volume and cost per provider and reason over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackUsage {
    pub provider: String,
    pub reason: FallbackReason,
    pub count: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub avg_latency_ms: f64,
}

/// Provider name written when no provider remained to fall back to.
pub const NO_FALLBACK_PROVIDER: &str = "none";

// --- Scheduling ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSchedule {
    pub id: Uuid,
    pub company_id: Uuid,
    pub competitor_id: Option<Uuid>,
    pub report_type: ReportType,
    pub cron_expression: String,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ReportSchedule {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.next_run_at.map_or(true, |next| next <= now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleExecution {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub report_id: Option<Uuid>,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

// --- Content tracking ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub id: Uuid,
    pub competitor_id: Uuid,
    pub url: String,
    pub content_hash: String,
    pub content: String,
    pub version: i32,
    pub scraped_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentChange {
    pub id: Uuid,
    pub competitor_id: Uuid,
    pub url: String,
    pub old_version: i32,
    pub new_version: i32,
    pub diff: String,
    pub change_ratio: f64,
    pub detected_at: DateTime<Utc>,
}

// --- Email ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub id: Uuid,
    pub company_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailDelivery {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub report_id: Uuid,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
