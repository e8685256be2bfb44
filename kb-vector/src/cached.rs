//! Wraps a [`VectorStore`] with a 5-minute existence cache so `ensure_collection`
//! doesn't round-trip to the backend on every write, grounded on the
//! original repository's `_collections_cache` / `_collections_cache_time` pattern.

use crate::store::VectorStore;
use crate::types::{CollectionSchema, Filter, Point, ScrollPage, SearchHit};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kb_core::KbResult;
use std::collections::BTreeMap;
use std::sync::Arc;

const EXISTENCE_TTL_SECS: i64 = 300;

pub struct CachedVectorStore {
    inner: Arc<dyn VectorStore>,
    known_at: DashMap<String, DateTime<Utc>>,
}

impl CachedVectorStore {
    pub fn new(inner: Arc<dyn VectorStore>) -> Self {
        Self { inner, known_at: DashMap::new() }
    }

    fn is_fresh(&self, collection: &str) -> bool {
        self.known_at
            .get(collection)
            .map(|t| Utc::now() - *t < chrono::Duration::seconds(EXISTENCE_TTL_SECS))
            .unwrap_or(false)
    }
}

#[async_trait]
impl VectorStore for CachedVectorStore {
    async fn ensure_collection(&self, collection: &str, schema: &CollectionSchema) -> KbResult<()> {
        if self.is_fresh(collection) {
            return Ok(());
        }
        self.inner.ensure_collection(collection, schema).await?;
        self.known_at.insert(collection.to_string(), Utc::now());
        Ok(())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<Point>) -> KbResult<()> {
        self.inner.upsert_points(collection, points).await
    }

    async fn retrieve_by_ids(&self, collection: &str, ids: &[String]) -> KbResult<Vec<Point>> {
        self.inner.retrieve_by_ids(collection, ids).await
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
        offset: Option<String>,
    ) -> KbResult<ScrollPage> {
        self.inner.scroll(collection, filter, limit, offset).await
    }

    async fn set_payload(
        &self,
        collection: &str,
        id: &str,
        fields: BTreeMap<String, serde_json::Value>,
    ) -> KbResult<()> {
        self.inner.set_payload(collection, id, fields).await
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        filter: Option<&Filter>,
        limit: usize,
    ) -> KbResult<Vec<SearchHit>> {
        self.inner.search(collection, query, filter, limit).await
    }

    async fn ping(&self) -> bool {
        self.inner.ping().await
    }
}
