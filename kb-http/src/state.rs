use std::sync::Arc;

use kb_auth::AuthService;
use kb_cache::TwoTierCache;
use kb_queue::{QueueBackend, QueueCtx};
use kb_repository::JobRepository;
use kb_vector::VectorStore;

/// Shared collaborators for every handler: the auth/rate-limit service, the
/// job repository (the write side of ingestion), and the broker backend
/// ingestion enqueues onto directly (spec.md §2: "HTTP ingest ->
/// Repository.write(pending) -> Broker.enqueue(high-priority)"). `cache`
/// and `vector_store` are only consulted by `/health/detailed`.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub repository: Arc<dyn JobRepository>,
    pub backend: Arc<dyn QueueBackend>,
    pub cache: Arc<TwoTierCache>,
    pub vector_store: Arc<dyn VectorStore>,
    pub tenant: String,
}

impl AppState {
    pub fn new(
        auth: Arc<AuthService>,
        repository: Arc<dyn JobRepository>,
        backend: Arc<dyn QueueBackend>,
        cache: Arc<TwoTierCache>,
        vector_store: Arc<dyn VectorStore>,
        tenant: impl Into<String>,
    ) -> Self {
        Self { auth, repository, backend, cache, vector_store, tenant: tenant.into() }
    }

    pub fn queue_ctx(&self) -> QueueCtx {
        QueueCtx::new(self.tenant.clone())
    }
}
