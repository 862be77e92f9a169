use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

// =============================================================================
// Secrets (env)
// =============================================================================

/// Secrets and environment-specific values, loaded from env vars (and `.env`).
/// Tunables live in the TOML [`FileConfig`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,

    // LLM providers; a missing key drops that provider from the fallback chain
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,

    // Data sources
    pub newsapi_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub google_maps_api_key: Option<String>,

    // Email
    pub sendgrid_api_key: Option<String>,
    pub email_from: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openrouter_api_key: optional_env("OPENROUTER_API_KEY"),
            newsapi_key: optional_env("NEWSAPI_KEY"),
            tavily_api_key: optional_env("TAVILY_API_KEY"),
            google_maps_api_key: optional_env("GOOGLE_MAPS_API_KEY"),
            sendgrid_api_key: optional_env("SENDGRID_API_KEY"),
            email_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "reports@onside.local".to_string()),
        };

        config.log_keys();
        Ok(config)
    }

    /// Key for a provider kind, if configured.
    pub fn provider_key(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Anthropic => self.anthropic_api_key.as_deref(),
            ProviderKind::Openai => self.openai_api_key.as_deref(),
            ProviderKind::Openrouter => self.openrouter_api_key.as_deref(),
        }
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  JWT_SECRET: {}", preview(&self.jwt_secret));
        tracing::info!("  ANTHROPIC_API_KEY: {}", preview_opt(&self.anthropic_api_key));
        tracing::info!("  OPENAI_API_KEY: {}", preview_opt(&self.openai_api_key));
        tracing::info!("  OPENROUTER_API_KEY: {}", preview_opt(&self.openrouter_api_key));
        tracing::info!("  NEWSAPI_KEY: {}", preview_opt(&self.newsapi_key));
        tracing::info!("  TAVILY_API_KEY: {}", preview_opt(&self.tavily_api_key));
        tracing::info!("  GOOGLE_MAPS_API_KEY: {}", preview_opt(&self.google_maps_api_key));
        tracing::info!("  SENDGRID_API_KEY: {}", preview_opt(&self.sendgrid_api_key));
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// First few characters of a secret plus its length; never the whole value.
pub fn preview(val: &str) -> String {
    let n = val
        .char_indices()
        .nth(5)
        .map(|(i, _)| i)
        .unwrap_or(val.len());
    format!("{}...({} chars)", &val[..n], val.len())
}

fn preview_opt(val: &Option<String>) -> String {
    match val {
        Some(v) if !v.is_empty() => preview(v),
        _ => "<not set>".to_string(),
    }
}

// =============================================================================
// Tunables (TOML)
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Openai,
    Openrouter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
}

/// Fallback chain: providers in priority order plus the retry policy.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub providers: Vec<ProviderConfig>,
    pub max_attempts: usize,
    pub attempt_timeout_secs: u64,
    pub min_confidence: f64,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderConfig {
                    kind: ProviderKind::Anthropic,
                    model: "claude-sonnet-4-20250514".to_string(),
                },
                ProviderConfig {
                    kind: ProviderKind::Openai,
                    model: "gpt-4o".to_string(),
                },
                ProviderConfig {
                    kind: ProviderKind::Openrouter,
                    model: "meta-llama/llama-3.1-70b-instruct".to_string(),
                },
            ],
            max_attempts: 3,
            attempt_timeout_secs: 60,
            min_confidence: 0.6,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportsConfig {
    pub export_dir: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("./exports"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub news_limit: u32,
    pub search_limit: u32,
    pub places_limit: u32,
    #[serde(default)]
    pub rss_feeds: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            news_limit: 10,
            search_limit: 5,
            places_limit: 5,
            rss_feeds: Vec::new(),
        }
    }
}

impl FileConfig {
    /// Load and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.llm.max_attempts == 0 {
            anyhow::bail!("llm.max_attempts must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.llm.min_confidence) {
            anyhow::bail!("llm.min_confidence must be between 0 and 1");
        }
        if self.scheduler.tick_secs == 0 {
            anyhow::bail!("scheduler.tick_secs must be positive");
        }
        Ok(())
    }
}
