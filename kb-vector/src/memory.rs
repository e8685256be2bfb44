use crate::store::VectorStore;
use crate::types::{CollectionSchema, Filter, Point, ScrollPage, SearchHit};
use async_trait::async_trait;
use dashmap::DashMap;
use kb_core::KbResult;
use std::collections::BTreeMap;

/// In-memory vector store for tests: exact-match filtering, brute-force
/// cosine search over the dense vector only.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: DashMap<String, Vec<Point>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, collection: &str, _schema: &CollectionSchema) -> KbResult<()> {
        self.collections.entry(collection.to_string()).or_default();
        Ok(())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<Point>) -> KbResult<()> {
        let mut entry = self.collections.entry(collection.to_string()).or_default();
        for point in points {
            if let Some(existing) = entry.iter_mut().find(|p| p.id == point.id) {
                *existing = point;
            } else {
                entry.push(point);
            }
        }
        Ok(())
    }

    async fn retrieve_by_ids(&self, collection: &str, ids: &[String]) -> KbResult<Vec<Point>> {
        Ok(self
            .collections
            .get(collection)
            .map(|points| points.iter().filter(|p| ids.contains(&p.id)).cloned().collect())
            .unwrap_or_default())
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
        offset: Option<String>,
    ) -> KbResult<ScrollPage> {
        let points = self.collections.get(collection).map(|p| p.clone()).unwrap_or_default();
        let start = offset.and_then(|o| o.parse::<usize>().ok()).unwrap_or(0);
        let matching: Vec<Point> = points.into_iter().filter(|p| filter.matches(&p.payload)).collect();
        let page: Vec<Point> = matching.iter().skip(start).take(limit).cloned().collect();
        let next_offset = if start + page.len() < matching.len() {
            Some((start + page.len()).to_string())
        } else {
            None
        };
        Ok(ScrollPage { points: page, next_offset })
    }

    async fn set_payload(
        &self,
        collection: &str,
        id: &str,
        fields: BTreeMap<String, serde_json::Value>,
    ) -> KbResult<()> {
        if let Some(mut points) = self.collections.get_mut(collection) {
            if let Some(point) = points.iter_mut().find(|p| p.id == id) {
                point.payload.extend(fields);
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        filter: Option<&Filter>,
        limit: usize,
    ) -> KbResult<Vec<SearchHit>> {
        let points = self.collections.get(collection).map(|p| p.clone()).unwrap_or_default();
        let mut hits: Vec<SearchHit> = points
            .into_iter()
            .filter(|p| filter.map(|f| f.matches(&p.payload)).unwrap_or(true))
            .map(|p| SearchHit {
                distance: cosine(query, &p.vectors.dense),
                id: p.id,
                payload: p.payload,
            })
            .collect();
        hits.sort_by(|a, b| b.distance.partial_cmp(&a.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, dense: Vec<f32>, status: &str) -> Point {
        let mut payload = BTreeMap::new();
        payload.insert("status".to_string(), serde_json::json!(status));
        Point { id: id.to_string(), vectors: crate::types::Vectors { dense, ..Default::default() }, payload }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_id() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("c", &CollectionSchema::default()).await.unwrap();
        store.upsert_points("c", vec![point("1", vec![1.0, 0.0], "pending")]).await.unwrap();
        store.upsert_points("c", vec![point("1", vec![0.0, 1.0], "done")]).await.unwrap();
        let got = store.retrieve_by_ids("c", &["1".to_string()]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].vectors.dense, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let store = InMemoryVectorStore::new();
        store.upsert_points(
            "c",
            vec![point("a", vec![1.0, 0.0], "done"), point("b", vec![0.0, 1.0], "done")],
        )
        .await
        .unwrap();
        let hits = store.search("c", &[1.0, 0.0], None, 2).await.unwrap();
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn scroll_filters_by_payload_and_paginates() {
        let store = InMemoryVectorStore::new();
        store.upsert_points(
            "c",
            vec![point("a", vec![], "pending"), point("b", vec![], "done")],
        )
        .await
        .unwrap();
        let page = store
            .scroll("c", &Filter::default().eq("status", "pending"), 10, None)
            .await
            .unwrap();
        assert_eq!(page.points.len(), 1);
        assert_eq!(page.points[0].id, "a");
    }
}
