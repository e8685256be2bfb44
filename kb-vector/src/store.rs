use crate::types::{CollectionSchema, Filter, Point, ScrollPage, SearchHit};
use async_trait::async_trait;
use kb_core::KbResult;

/// The Vector Store Adapter contract (spec.md §4.4).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent. Create the collection with the dense/sparse/late-interaction
    /// schema and payload indexes on first write; existence is cached by the
    /// caller with a 5-minute TTL to avoid metadata round-trips.
    async fn ensure_collection(&self, collection: &str, schema: &CollectionSchema) -> KbResult<()>;

    async fn upsert_points(&self, collection: &str, points: Vec<Point>) -> KbResult<()>;

    async fn retrieve_by_ids(&self, collection: &str, ids: &[String]) -> KbResult<Vec<Point>>;

    async fn scroll(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
        offset: Option<String>,
    ) -> KbResult<ScrollPage>;

    async fn set_payload(
        &self,
        collection: &str,
        id: &str,
        fields: std::collections::BTreeMap<String, serde_json::Value>,
    ) -> KbResult<()>;

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        filter: Option<&Filter>,
        limit: usize,
    ) -> KbResult<Vec<SearchHit>>;

    async fn ping(&self) -> bool;
}
