//! Background worker process, grounded on `run_worker_redis.py` /
//! `app/worker/worker.py`: drains the broker through a [`WorkerRuntime`]
//! and sweeps the repository for directly-ingested jobs through a
//! [`Scheduler`], sharing one [`ProcessorRegistry`] and [`Notifier`].
//! SIGTERM/Ctrl-C stop both loops and wait for the in-flight job to finish
//! before the process exits, matching `run_worker_redis.py`'s signal
//! handler.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use kb_cache::{MemoryDurableTier, MemoryFastTier, PostgresDurableTier, RedisFastTier, TwoTierCache};
use kb_core::config::{AppConfig, NotificationKind};
use kb_core::{JobType, SourceType};
use kb_embedding::{EmbeddingPipeline, EmbeddingProvider, MockEmbeddingProvider};
use kb_notifier::Notifier;
use kb_processors::{EmailAnalysisProcessor, EmbeddingProcessor, LlmProvider, MockLlmProvider, ProcessorRegistry, SubjectAnalysisProcessor};
use kb_queue::backend::memory::MemoryBackend;
use kb_queue::{QueueBackend, QueueCtx, RedisBackend, Scheduler, WorkerRuntime};
use kb_repository::{JobRepository, KvJobRepository, RelationalJobRepository};
use kb_vector::{InMemoryVectorStore, QdrantVectorStore, VectorStore};
use tracing::info;

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

fn build_vector_store(config: &AppConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    match &config.qdrant.host {
        Some(host) => {
            Ok(Arc::new(QdrantVectorStore::new(host, config.qdrant.port, config.qdrant.api_key.clone(), config.qdrant.timeout)?))
        }
        None => Ok(Arc::new(InMemoryVectorStore::new())),
    }
}

/// Wires the three processors behind mock model providers (spec.md's
/// Non-goals exclude the embedding algorithm and the LLM itself).
fn build_registry(config: &AppConfig, vector_store: Arc<dyn VectorStore>) -> ProcessorRegistry {
    let llm: Arc<dyn LlmProvider> = Arc::new(MockLlmProvider {
        response: serde_json::json!({"entities": [], "action_items": [], "summary": ""}).to_string(),
    });
    let embedding_provider: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::default());
    let pipeline = Arc::new(EmbeddingPipeline::new(embedding_provider, vector_store));

    let mut registry = ProcessorRegistry::new();
    registry.register(JobType::EmailAnalysis, Arc::new(EmailAnalysisProcessor::new(llm.clone(), config.app.company_domains.clone())));
    registry.register(JobType::SubjectAnalysis, Arc::new(SubjectAnalysisProcessor::new(llm)));
    registry.register(JobType::Embedding, Arc::new(EmbeddingProcessor::new(pipeline)));
    registry
}

/// No dedicated "which notifier" config key exists, so precedence mirrors
/// `DefaultNotifierFactory`'s fallback order: an enabled webhook wins,
/// then a configured email list, then SMS, else a disabled webhook no-op.
fn select_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    let kind = if config.webhook.enabled {
        NotificationKind::Webhook
    } else if !config.notifications.email.recipients.is_empty() {
        NotificationKind::Email
    } else if config.notifications.sms.enabled {
        NotificationKind::Sms
    } else {
        NotificationKind::Webhook
    };
    kb_notifier::build_notifier(kind, config)
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sig.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received sigterm"),
    }
}

/// Runs the worker loop and the scheduler sweep side by side until a
/// shutdown signal arrives, then stops new dequeues and waits for the
/// in-flight job before returning.
async fn run<R, B>(
    config: &AppConfig,
    repository: Arc<R>,
    backend: Arc<B>,
    processors: Arc<ProcessorRegistry>,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<()>
where
    R: JobRepository + 'static,
    B: QueueBackend + 'static,
{
    let tenant = config.app.company_domains.first().cloned().unwrap_or_else(|| "default".to_string());
    let ctx = QueueCtx::new(tenant);

    let runtime = Arc::new(WorkerRuntime::new(backend.clone(), repository.clone(), processors, notifier));
    let worker_handle = runtime.spawn(ctx.clone());

    let sources = vec![SourceType::Email, SourceType::Sharepoint, SourceType::AwsS3, SourceType::Azure];
    let scheduler = Arc::new(Scheduler::new(repository, backend, sources));
    let (scheduler_shutdown_tx, scheduler_shutdown_rx) = tokio::sync::oneshot::channel();
    let scheduler_task = {
        let scheduler = scheduler.clone();
        let scheduler_ctx = ctx.clone();
        tokio::spawn(async move { scheduler.run(scheduler_ctx, scheduler_shutdown_rx).await })
    };

    wait_for_shutdown_signal().await;
    info!("shutdown requested, draining worker runtime and scheduler");

    let _ = scheduler_shutdown_tx.send(());
    worker_handle.shutdown().await.map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let _ = scheduler_task.await;

    info!("kb-worker stopped");
    Ok(())
}

/// CLI surface for the worker process, grounded on the casparian example's
/// `clap::Parser` convention (`--config`/`--log-level` instead of a bespoke
/// arg loop).
#[derive(Parser, Debug)]
#[command(name = "kb-worker", about = "Knowledge-base background worker process")]
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
    let vector_store = build_vector_store(&config)?;
    let processors = Arc::new(build_registry(&config, vector_store));
    let notifier = select_notifier(&config);

    let redis_url = config.redis.url();
    let postgres_url = config.postgres.database_url.clone();

    match (redis_url, postgres_url) {
        (Some(redis_url), Some(pg_url)) => {
            let backend = Arc::new(RedisBackend::connect(&redis_url).await?);
            let repository = Arc::new(RelationalJobRepository::connect(&pg_url).await?);
            run(&config, repository, backend, processors, notifier).await
        }
        (Some(redis_url), None) => {
            let backend = Arc::new(RedisBackend::connect(&redis_url).await?);
            let repository = Arc::new(KvJobRepository::new(cache));
            run(&config, repository, backend, processors, notifier).await
        }
        (None, Some(pg_url)) => {
            let backend = Arc::new(MemoryBackend::new());
            let repository = Arc::new(RelationalJobRepository::connect(&pg_url).await?);
            run(&config, repository, backend, processors, notifier).await
        }
        (None, None) => {
            let backend = Arc::new(MemoryBackend::new());
            let repository = Arc::new(KvJobRepository::new(cache));
            run(&config, repository, backend, processors, notifier).await
        }
    }
}
