//! Service layer: everything between the HTTP handlers and the database.

pub mod deps;
pub mod fallback;
pub mod gather;
mod html;
pub mod mailer;
pub mod reasoning;
pub mod reports;
pub mod scheduling;
pub mod sources;
pub mod tracking;

pub use deps::EngineDeps;
pub use fallback::{
    AttemptRecord, AttemptRecorder, FallbackError, FallbackManager, FallbackOutcome,
    FallbackPolicy, FallbackRecord, NoopRecorder, PgRecorder,
};
pub use gather::{gather, GatherContext, Gathered, Sources, TaskOutcome};
pub use mailer::{deliver_report, DeliverySummary, Mailer, NoopMailer, SendGridMailer};
pub use reasoning::{AnalysisOutput, AnalysisRequest, ParseError, ReasoningStep};
pub use reports::{export_json, normalize_website, render_text, ReportGenerator};
pub use scheduling::{next_run_after, parse_cron, ScheduleRunner, TickSummary};
pub use tracking::{
    ContentStore, ContentTracker, HttpPageFetcher, PageFetcher, PgContentStore, TrackOutcome,
};
