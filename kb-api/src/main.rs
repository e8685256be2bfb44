//! HTTP edge process, grounded on `run_api.py`: load configuration, wire
//! collaborators, serve the router. `app.port` picks the bind port; the
//! bind host is always `0.0.0.0` as in the original's `uvicorn.run`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use kb_auth::AuthService;
use kb_cache::{MemoryDurableTier, MemoryFastTier, PostgresDurableTier, RedisFastTier, TwoTierCache};
use kb_core::{AppConfig, SystemClock};
use kb_queue::backend::memory::MemoryBackend;
use kb_queue::{QueueBackend, RedisBackend};
use kb_repository::{JobRepository, KvJobRepository, RelationalJobRepository};
use kb_vector::{InMemoryVectorStore, QdrantVectorStore, VectorStore};

async fn build_cache(config: &AppConfig) -> anyhow::Result<Arc<TwoTierCache>> {
    let fast: Arc<dyn kb_cache::FastTier> = match config.redis.url() {
        Some(url) => Arc::new(RedisFastTier::connect(&url).await?),
        None => Arc::new(MemoryFastTier::new()),
    };

    let durable: Arc<dyn kb_cache::DurableTier> = match &config.postgres.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new().max_connections(5).connect(url).await?;
            Arc::new(PostgresDurableTier::new(pool))
        }
        None => Arc::new(MemoryDurableTier::new()),
    };

    Ok(Arc::new(TwoTierCache::new(fast, durable)))
}

async fn build_repository(config: &AppConfig, cache: Arc<TwoTierCache>) -> anyhow::Result<Arc<dyn JobRepository>> {
    match &config.postgres.database_url {
        Some(url) => Ok(Arc::new(RelationalJobRepository::connect(url).await?)),
        None => Ok(Arc::new(KvJobRepository::new(cache))),
    }
}

async fn build_backend(config: &AppConfig) -> anyhow::Result<Arc<dyn QueueBackend>> {
    match config.redis.url() {
        Some(url) => Ok(Arc::new(RedisBackend::connect(&url).await?)),
        None => Ok(Arc::new(MemoryBackend::new())),
    }
}

fn build_vector_store(config: &AppConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    match &config.qdrant.host {
        Some(host) => {
            Ok(Arc::new(QdrantVectorStore::new(host, config.qdrant.port, config.qdrant.api_key.clone(), config.qdrant.timeout)?))
        }
        None => Ok(Arc::new(InMemoryVectorStore::new())),
    }
}

/// CLI surface for the HTTP edge process, grounded on the casparian
/// example's `clap::Parser` convention (`--config`/`--log-level` instead of
/// a bespoke arg loop).
#[derive(Parser, Debug)]
#[command(name = "kb-api", about = "Knowledge-base HTTP edge process")]
struct Args {
    #[arg(long, env = "KB_CONFIG_PATH", default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::load(&args.config)?;
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }
    kb_core::logging::init(&config.logging.level, config.app.env != "development");

    let cache = build_cache(&config).await?;
    let repository = build_repository(&config, cache.clone()).await?;
    let backend = build_backend(&config).await?;
    let vector_store = build_vector_store(&config)?;
    let auth = Arc::new(AuthService::new(cache.clone(), Arc::new(SystemClock), config.rate_limits.clone()));

    let tenant = config.app.company_domains.first().cloned().unwrap_or_else(|| "default".to_string());
    let state = kb_http::AppState::new(auth, repository, backend, cache, vector_store, tenant);

    let addr = format!("0.0.0.0:{}", config.app.port);
    tracing::info!(addr, "kb-api listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, kb_http::app(state)).await?;

    Ok(())
}
