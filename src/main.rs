//! FitCoach - line-oriented JSON service.
//!
//! Reads one request per line on stdin and writes one response per line on
//! stdout. Logs go to stderr.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fitcoach::api::{Api, ApiRequest, DataResponse, StaticTokenIdentity};
use fitcoach::coach::{ConfiguredGenerator, DraftFactory};
use fitcoach::storage::{config, Database, DurableFlags, LocalCache};
use fitcoach::sync::{ConfiguredStore, ReconciliationEngine, SqliteRetryQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting FitCoach v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config().context("failed to load configuration")?;
    let db_path = config.database_path();
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    let flags = DurableFlags::with_ttl(
        db.clone(),
        chrono::Duration::days(config.cache.onboarding_flag_ttl_days),
    );
    let expired = flags.cleanup_expired()?;
    if expired > 0 {
        tracing::debug!("Removed {} expired flags", expired);
    }
    let cache = LocalCache::new(db.clone(), flags);

    let store = ConfiguredStore::from_settings(&config.store)?;
    let queue = SqliteRetryQueue::with_limit(db, config.cache.retry_queue_limit);
    let engine = Arc::new(
        ReconciliationEngine::new(Arc::new(store), Arc::new(queue), cache)
            .with_store_timeout(Duration::from_secs(config.store.timeout_secs)),
    );

    let generator = ConfiguredGenerator::from_settings(&config.generator)?;
    let factory = DraftFactory::new(generator)
        .with_timeout(Duration::from_secs(config.generator.timeout_secs));

    let identity = StaticTokenIdentity::from_settings(&config.identity);
    if identity.is_empty() {
        tracing::warn!("No identity tokens configured; authenticated requests will be refused");
    }

    let api = Api::new(Arc::clone(&engine), factory, identity);

    // Background retry of queued writes
    let flush_engine = Arc::clone(&engine);
    let interval = Duration::from_secs(config.cache.flush_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match flush_engine.flush_all().await {
                Ok(report) if report.synced > 0 || report.dropped > 0 => tracing::info!(
                    "Background sync: {} synced, {} dropped, {} remaining",
                    report.synced,
                    report.dropped,
                    report.remaining
                ),
                Ok(_) => {}
                Err(e) => tracing::warn!("Background sync failed: {}", e),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match ApiRequest::parse(line) {
            Ok(request) => api.dispatch(request).await,
            Err(e) => DataResponse::failure(e.status_code(), e.to_string()),
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    match engine.flush_all().await {
        Ok(report) if report.remaining > 0 => tracing::info!(
            "{} writes still queued; they will be retried on next start",
            report.remaining
        ),
        Ok(_) => {}
        Err(e) => tracing::warn!("Final sync failed: {}", e),
    }

    tracing::info!("FitCoach shutting down");
    Ok(())
}
