use std::sync::Arc;
use std::time::Duration;

use kb_core::{JobType, RequestContext, SourceType};
use kb_notifier::Notifier;
use kb_processors::ProcessorRegistry;
use kb_repository::JobRepository;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::observability::ObservabilityLayer;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_secs(60);
const LOCK_TTL_SECS: i64 = 300;

/// KV-only fallback job loop for deployments with no broker configured
/// (spec.md §9), a direct generalization of `app/worker/worker.py`'s
/// `poll_for_jobs`/`process_job`: scan the repository for claimable jobs
/// once a second, claim and run each inline, sleep longer after an error.
pub struct PollLoop<R: JobRepository> {
    repository: Arc<R>,
    processors: Arc<ProcessorRegistry>,
    notifier: Arc<dyn Notifier>,
    observability: Arc<ObservabilityLayer>,
    sources: Vec<SourceType>,
}

impl<R: JobRepository> PollLoop<R> {
    pub fn new(repository: Arc<R>, processors: Arc<ProcessorRegistry>, notifier: Arc<dyn Notifier>, sources: Vec<SourceType>) -> Self {
        Self { repository, processors, notifier, observability: Arc::new(ObservabilityLayer::new()), sources }
    }

    pub async fn run(&self, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        info!(sources = ?self.sources, "kv poll loop started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("poll loop shutdown requested");
                    break;
                }
                _ = self.tick() => {}
            }
        }
        info!("kv poll loop stopped");
    }

    async fn tick(&self) {
        let mut any_error = false;
        for source in &self.sources {
            match self.repository.list_pending(source, 10).await {
                Ok(records) => {
                    for record in records {
                        let trace_id = Uuid::new_v4().to_string();
                        let lock_expires_at = chrono::Utc::now() + chrono::Duration::seconds(LOCK_TTL_SECS);
                        match self.repository.claim(&record.job_id, lock_expires_at).await {
                            Ok(true) => self.process_job(&record.job_id, record.job_type, &trace_id).await,
                            Ok(false) => {}
                            Err(e) => warn!(job_id = %record.job_id, error = %e, "failed to claim job"),
                        }
                    }
                }
                Err(e) => {
                    error!(%source, error = %e, "error polling for jobs");
                    any_error = true;
                }
            }
        }
        tokio::time::sleep(if any_error { ERROR_BACKOFF } else { POLL_INTERVAL }).await;
    }

    async fn process_job(&self, job_id: &str, job_type: JobType, trace_id: &str) {
        let payload = match self.repository.get_data(job_id).await {
            Ok(p) => p,
            Err(e) => {
                let _ = self.repository.store_error(job_id, e.to_string()).await;
                return;
            }
        };

        let processor = match self.processors.resolve(job_type) {
            Ok(p) => p,
            Err(e) => {
                let _ = self.repository.store_error(job_id, e.to_string()).await;
                return;
            }
        };

        let owner = match self.repository.get_record(job_id).await {
            Ok(record) => record.owner,
            Err(_) => String::new(),
        };

        let request_ctx = RequestContext::new(trace_id.to_string()).with_job(job_id.to_string()).with_owner(owner);
        match processor.process(payload, &request_ctx).await {
            Ok(results) => {
                self.notifier.notify(&results, job_id, trace_id).await;
                if let Err(e) = self.repository.store_results(job_id, results).await {
                    error!(job_id, error = %e, "failed to store job results");
                }
                self.observability.record_job_completed(&crate::JobId::from(job_id), job_type.as_str()).await;
                info!(job_id, "job completed via poll loop");
            }
            Err(e) => {
                if let Err(store_err) = self.repository.store_error(job_id, e.to_string()).await {
                    error!(job_id, error = %store_err, "failed to store job error");
                }
                self.observability.record_job_failed(&crate::JobId::from(job_id), job_type.as_str(), &e.to_string()).await;
                warn!(job_id, error = %e, "job failed via poll loop");
            }
        }
    }
}
