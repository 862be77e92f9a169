use std::sync::Arc;
use std::time::Duration;

use ai_client::{Claude, CompletionProvider, OpenAi, OpenRouter};
use anyhow::Result;
use onside_common::{AppConfig, FileConfig, ProviderKind};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::fallback::{FallbackManager, FallbackPolicy, PgRecorder};
use crate::gather::Sources;
use crate::mailer::{Mailer, NoopMailer, SendGridMailer};
use crate::reports::ReportGenerator;
use crate::scheduling::ScheduleRunner;
use crate::sources::{GooglePlaces, HttpSeoAnalyzer, NewsApiClient, RssNewsSource, TavilySearcher};
use crate::tracking::{ContentTracker, HttpPageFetcher, PgContentStore};

pub type Tracker = ContentTracker<HttpPageFetcher, PgContentStore>;

/// Central dependency container shared by the API handlers and the scheduler.
#[derive(Clone)]
pub struct EngineDeps {
    pub pool: PgPool,
    pub config: AppConfig,
    pub file_config: Arc<FileConfig>,
    pub fallback: Arc<FallbackManager>,
    pub generator: Arc<ReportGenerator>,
    pub tracker: Arc<Tracker>,
    pub mailer: Arc<dyn Mailer>,
}

impl EngineDeps {
    pub fn build(pool: PgPool, config: AppConfig, file_config: FileConfig) -> Result<Self> {
        let providers = build_providers(&config, &file_config)?;
        if providers.is_empty() {
            warn!("No LLM provider keys set; report generation will fail");
        }

        let fallback = Arc::new(FallbackManager::new(
            providers,
            FallbackPolicy::from(&file_config.llm),
            Arc::new(PgRecorder::new(pool.clone())),
        ));
        let sources = build_sources(&config, &file_config)?;
        let generator = Arc::new(ReportGenerator::new(
            pool.clone(),
            fallback.clone(),
            sources,
            file_config.llm.temperature,
        ));
        let tracker = Arc::new(ContentTracker::new(
            HttpPageFetcher::new()?,
            PgContentStore::new(pool.clone()),
        ));
        let mailer = build_mailer(&config)?;

        Ok(Self {
            pool,
            config,
            file_config: Arc::new(file_config),
            fallback,
            generator,
            tracker,
            mailer,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schedule_runner(&self) -> ScheduleRunner {
        ScheduleRunner::new(
            self.pool.clone(),
            self.generator.clone(),
            self.mailer.clone(),
            Duration::from_secs(self.file_config.scheduler.tick_secs),
        )
    }
}

/// Providers in configured order; entries without an API key are skipped.
pub fn build_providers(
    config: &AppConfig,
    file_config: &FileConfig,
) -> Result<Vec<Arc<dyn CompletionProvider>>> {
    let timeout = Duration::from_secs(file_config.llm.attempt_timeout_secs);
    let mut providers: Vec<Arc<dyn CompletionProvider>> = Vec::new();

    for entry in &file_config.llm.providers {
        let Some(key) = config.provider_key(entry.kind) else {
            info!(provider = ?entry.kind, "No API key, provider skipped");
            continue;
        };
        let provider: Arc<dyn CompletionProvider> = match entry.kind {
            ProviderKind::Anthropic => {
                Arc::new(Claude::new(key, &entry.model)?.with_timeout(timeout)?)
            }
            ProviderKind::Openai => Arc::new(OpenAi::new(key, &entry.model)?.with_timeout(timeout)?),
            ProviderKind::Openrouter => Arc::new(
                OpenRouter::new(key, &entry.model)?
                    .with_app_name("OnSide")
                    .with_timeout(timeout)?,
            ),
        };
        info!(provider = provider.name(), model = provider.model(), "LLM provider enabled");
        providers.push(provider);
    }

    Ok(providers)
}

pub fn build_sources(config: &AppConfig, file_config: &FileConfig) -> Result<Sources> {
    let limits = &file_config.sources;
    let mut sources = Sources {
        news_limit: limits.news_limit,
        search_limit: limits.search_limit,
        places_limit: limits.places_limit,
        seo: Some(Arc::new(HttpSeoAnalyzer::new()?)),
        ..Default::default()
    };

    if let Some(key) = &config.newsapi_key {
        sources.news = Some(Arc::new(NewsApiClient::new(key.clone())?));
    } else if !limits.rss_feeds.is_empty() {
        sources.news = Some(Arc::new(RssNewsSource::new(limits.rss_feeds.clone())?));
    }
    if let Some(key) = &config.tavily_api_key {
        sources.search = Some(Arc::new(TavilySearcher::new(key.clone())?));
    }
    if let Some(key) = &config.google_maps_api_key {
        sources.places = Some(Arc::new(GooglePlaces::new(key.clone())?));
    }

    Ok(sources)
}

pub fn build_mailer(config: &AppConfig) -> Result<Arc<dyn Mailer>> {
    match &config.sendgrid_api_key {
        Some(key) => {
            info!("SendGrid email delivery enabled");
            Ok(Arc::new(SendGridMailer::new(key.clone(), config.email_from.clone())?))
        }
        None => {
            info!("No SENDGRID_API_KEY set, email delivery disabled");
            Ok(Arc::new(NoopMailer))
        }
    }
}
