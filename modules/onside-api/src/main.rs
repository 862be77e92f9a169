use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use onside_common::{AppConfig, FileConfig};
use onside_engine::EngineDeps;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use onside_api::{build_router, AppState};

#[derive(Parser)]
#[command(name = "onside-api", about = "OnSide competitive-intelligence API")]
struct Cli {
    /// Path to config TOML file. Defaults apply when it does not exist.
    #[arg(long, default_value = "./config/onside.toml")]
    config: PathBuf,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("onside_api=info,onside_engine=info,onside_store=info,onside_common=info,ai_client=info")
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let file_config = if cli.config.exists() {
        info!(config = %cli.config.display(), "Loading config");
        FileConfig::load(&cli.config)?
    } else {
        info!(config = %cli.config.display(), "Config file not found, using defaults");
        FileConfig::default()
    };
    let config = AppConfig::from_env()?;

    let pool = onside_store::connect(&config.database_url, 20).await?;
    onside_store::migrate(&pool).await?;
    info!("Connected to database, migrations complete");

    let addr = format!("{}:{}", file_config.server.host, file_config.server.port);
    let scheduler_enabled = file_config.scheduler.enabled;
    let deps = EngineDeps::build(pool, config, file_config).context("Failed to build engine")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if scheduler_enabled {
        let runner = deps.schedule_runner();
        Some(tokio::spawn(async move { runner.run(shutdown_rx).await }))
    } else {
        info!("Scheduler disabled");
        None
    };

    let app = build_router(Arc::new(AppState::new(deps)));

    info!("OnSide API starting on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown_tx.send(true).ok();
        })
        .await?;

    if let Some(handle) = scheduler {
        handle.await.ok();
    }
    info!("OnSide API stopped");
    Ok(())
}
