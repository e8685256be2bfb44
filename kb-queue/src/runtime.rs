use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use kb_core::{JobType, RequestContext};
use kb_notifier::Notifier;
use kb_processors::ProcessorRegistry;
use kb_repository::JobRepository;

use crate::{
    backend::QueueBackend,
    observability::ObservabilityLayer,
    QueueCtx, QueueError, QueueResult,
};

/// Configuration for a worker runtime (spec.md §5).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queues: Vec<String>,
    pub idle_poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { queues: vec!["default".to_string()], idle_poll_interval: Duration::from_millis(250) }
    }
}

/// Handle to a running worker loop; drop or call [`WorkerHandle::shutdown`]
/// to stop polling and let the in-flight task finish before the process
/// exits (spec.md §5's graceful SIGTERM contract).
pub struct WorkerHandle {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<QueueResult<()>>,
}

impl WorkerHandle {
    pub async fn shutdown(self) -> QueueResult<()> {
        let _ = self.shutdown_tx.send(());
        self.join_handle.await.map_err(|e| QueueError::Internal(format!("worker join error: {e}")))?
    }
}

/// Dequeues leased jobs from a [`QueueBackend`], dispatches them through a
/// [`ProcessorRegistry`], acks the result, and fires a completion
/// notification. One runtime instance is one worker process's job loop.
/// Also writes the outcome back into a [`JobRepository`] so a job ingested
/// through the HTTP edge (spec.md §2: "HTTP ingest -> Repository.write
/// (pending) -> Broker.enqueue") reaches `Completed`/`Failed` in the
/// repository even though its queue state of record lives in `backend`.
pub struct WorkerRuntime<B: QueueBackend + ?Sized, R: JobRepository + ?Sized> {
    backend: Arc<B>,
    repository: Arc<R>,
    processors: Arc<ProcessorRegistry>,
    notifier: Arc<dyn Notifier>,
    observability: Arc<ObservabilityLayer>,
    config: WorkerConfig,
}

impl<B: QueueBackend + Send + Sync + 'static, R: JobRepository + Send + Sync + 'static> WorkerRuntime<B, R> {
    pub fn new(backend: Arc<B>, repository: Arc<R>, processors: Arc<ProcessorRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            repository,
            processors,
            notifier,
            observability: Arc::new(ObservabilityLayer::new()),
            config: WorkerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observability(mut self, observability: Arc<ObservabilityLayer>) -> Self {
        self.observability = observability;
        self
    }

    pub fn observability(&self) -> &ObservabilityLayer {
        &self.observability
    }

    /// Spawn the polling loop on the current runtime. The returned handle
    /// stops new dequeues on shutdown but always waits for an in-flight
    /// job to finish acking before returning.
    pub fn spawn(self: Arc<Self>, ctx: QueueCtx) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join_handle = tokio::spawn(self.run(ctx, shutdown_rx));
        WorkerHandle { shutdown_tx, join_handle }
    }

    async fn run(self: Arc<Self>, ctx: QueueCtx, mut shutdown_rx: oneshot::Receiver<()>) -> QueueResult<()> {
        let queues: Vec<&str> = self.config.queues.iter().map(|s| s.as_str()).collect();
        info!(queues = ?self.config.queues, "worker runtime started");

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("worker shutdown requested, draining");
                    break;
                }
                processed = self.process_next(&ctx, &queues) => {
                    match processed {
                        Ok(true) => {}
                        Ok(false) => tokio::time::sleep(self.config.idle_poll_interval).await,
                        Err(e) => {
                            error!(error = %e, "worker loop error");
                            tokio::time::sleep(self.config.idle_poll_interval).await;
                        }
                    }
                }
            }
        }

        info!("worker runtime stopped");
        Ok(())
    }

    async fn process_next(&self, ctx: &QueueCtx, queues: &[&str]) -> QueueResult<bool> {
        let leased = match self.backend.dequeue(ctx.clone(), queues).await? {
            Some(leased) => leased,
            None => return Ok(false),
        };

        let job_id = leased.job_id().clone();
        let message = leased.message();
        let job_type_str = message.job_type.clone();
        debug!(%job_id, job_type = %job_type_str, "dequeued job");

        let job_type = match job_type_str.parse::<JobType>() {
            Ok(jt) => jt,
            Err(_) => {
                let error = format!("unknown job type: {job_type_str}");
                self.backend.ack_fail(ctx.clone(), job_id.clone(), leased.lease_token.clone(), error.clone()).await?;
                if let Err(e) = self.repository.store_error(&job_id.to_string(), error.clone()).await {
                    warn!(%job_id, error = %e, "failed to persist job error to repository");
                }
                self.observability.record_job_failed(&job_id, &job_type_str, &error).await;
                return Ok(true);
            }
        };

        let processor = match self.processors.resolve(job_type) {
            Ok(p) => p,
            Err(e) => {
                self.backend.ack_fail(ctx.clone(), job_id.clone(), leased.lease_token.clone(), e.to_string()).await?;
                if let Err(store_err) = self.repository.store_error(&job_id.to_string(), e.to_string()).await {
                    warn!(%job_id, error = %store_err, "failed to persist job error to repository");
                }
                self.observability.record_job_failed(&job_id, &job_type_str, &e.to_string()).await;
                return Ok(true);
            }
        };

        let trace_id = ctx.trace_id.clone().unwrap_or_else(|| job_id.to_string());
        let request_ctx = RequestContext::new(trace_id.clone())
            .with_job(job_id.to_string())
            .with_owner(message.owner.clone());
        let result = processor.process(message.payload.clone(), &request_ctx).await;

        match result {
            Ok(output) => {
                self.notifier.notify(&output, &job_id.to_string(), &trace_id).await;
                self.backend.ack_complete(ctx.clone(), job_id.clone(), leased.lease_token.clone(), output.clone()).await?;
                if let Err(e) = self.repository.store_results(&job_id.to_string(), output).await {
                    warn!(%job_id, error = %e, "failed to persist job results to repository");
                }
                self.observability.record_job_completed(&job_id, &job_type_str).await;
                info!(%job_id, job_type = %job_type_str, "job completed");
            }
            Err(err) => {
                self.backend.ack_fail(ctx.clone(), job_id.clone(), leased.lease_token.clone(), err.to_string()).await?;
                if let Err(e) = self.repository.store_error(&job_id.to_string(), err.to_string()).await {
                    warn!(%job_id, error = %e, "failed to persist job error to repository");
                }
                self.observability.record_job_failed(&job_id, &job_type_str, &err.to_string()).await;
                warn!(%job_id, job_type = %job_type_str, error = %err, "job failed");
            }
        }

        Ok(true)
    }
}
