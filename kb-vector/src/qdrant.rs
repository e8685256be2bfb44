//! Qdrant HTTP client implementation of [`VectorStore`], grounded on
//! `app/core/qdrant.py`'s connect/create-collection/upsert calls, extended
//! to the multi-vector (dense + sparse + late-interaction) schema spec.md
//! §4.4 requires.

use crate::store::VectorStore;
use crate::types::{CollectionSchema, Filter, Point, ScrollPage, SearchHit};
use async_trait::async_trait;
use kb_core::{KbError, KbResult};
use serde_json::json;
use std::time::Duration;

pub struct QdrantVectorStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantVectorStore {
    pub fn new(host: &str, port: u16, api_key: Option<String>, timeout_secs: u64) -> KbResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| KbError::fatal(format!("building qdrant client: {e}")))?;
        Ok(Self { client, base_url: format!("http://{host}:{port}"), api_key })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        req
    }

    fn map_err(e: reqwest::Error) -> KbError {
        KbError::transient(format!("qdrant request failed: {e}"))
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, collection: &str, schema: &CollectionSchema) -> KbResult<()> {
        let existing = self
            .request(reqwest::Method::GET, &format!("/collections/{collection}"))
            .send()
            .await
            .map_err(Self::map_err)?;
        if existing.status().is_success() {
            return Ok(());
        }

        let body = json!({
            "vectors": {
                "dense": { "size": schema.dense_size, "distance": "Cosine" },
                "late_interaction": { "size": schema.late_interaction_dim, "distance": "Cosine", "multivector_config": { "comparator": "max_sim" } }
            },
            "sparse_vectors": { "sparse": { "modifier": "idf" } }
        });
        let resp = self
            .request(reqwest::Method::PUT, &format!("/collections/{collection}"))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_err)?;
        if !resp.status().is_success() {
            return Err(KbError::transient(format!("create collection failed: {}", resp.status())));
        }

        for field in &schema.payload_indexes {
            let index_body = json!({ "field_name": field, "field_schema": "keyword" });
            let _ = self
                .request(reqwest::Method::PUT, &format!("/collections/{collection}/index"))
                .json(&index_body)
                .send()
                .await;
        }
        Ok(())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<Point>) -> KbResult<()> {
        let qdrant_points: Vec<_> = points
            .into_iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "vector": {
                        "dense": p.vectors.dense,
                        "sparse": { "indices": p.vectors.sparse.indices, "values": p.vectors.sparse.values },
                        "late_interaction": p.vectors.late_interaction,
                    },
                    "payload": p.payload,
                })
            })
            .collect();

        let resp = self
            .request(reqwest::Method::PUT, &format!("/collections/{collection}/points?wait=true"))
            .json(&json!({ "points": qdrant_points }))
            .send()
            .await
            .map_err(Self::map_err)?;
        if !resp.status().is_success() {
            return Err(KbError::transient(format!("upsert failed: {}", resp.status())));
        }
        Ok(())
    }

    async fn retrieve_by_ids(&self, collection: &str, ids: &[String]) -> KbResult<Vec<Point>> {
        let resp = self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/points"))
            .json(&json!({ "ids": ids, "with_payload": true, "with_vector": false }))
            .send()
            .await
            .map_err(Self::map_err)?;
        let body: serde_json::Value = resp.json().await.map_err(Self::map_err)?;
        parse_points(body.get("result").cloned().unwrap_or_default())
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
        offset: Option<String>,
    ) -> KbResult<ScrollPage> {
        let mut body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
            "filter": qdrant_filter(filter),
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        let resp = self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/points/scroll"))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_err)?;
        let parsed: serde_json::Value = resp.json().await.map_err(Self::map_err)?;
        let result = parsed.get("result").cloned().unwrap_or_default();
        let points = parse_points(result.get("points").cloned().unwrap_or_default())?;
        let next_offset = result.get("next_page_offset").and_then(|v| v.as_str()).map(|s| s.to_string());
        Ok(ScrollPage { points, next_offset })
    }

    async fn set_payload(
        &self,
        collection: &str,
        id: &str,
        fields: std::collections::BTreeMap<String, serde_json::Value>,
    ) -> KbResult<()> {
        let resp = self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/points/payload?wait=true"))
            .json(&json!({ "payload": fields, "points": [id] }))
            .send()
            .await
            .map_err(Self::map_err)?;
        if !resp.status().is_success() {
            return Err(KbError::transient(format!("set_payload failed: {}", resp.status())));
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
        let mut body = json!({
            "vector": { "name": "dense", "vector": query },
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = qdrant_filter(filter);
        }
        let resp = self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/points/search"))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_err)?;
        let parsed: serde_json::Value = resp.json().await.map_err(Self::map_err)?;
        let result = parsed.get("result").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        Ok(result
            .into_iter()
            .filter_map(|entry| {
                Some(SearchHit {
                    id: entry.get("id")?.as_str()?.to_string(),
                    distance: entry.get("score")?.as_f64()? as f32,
                    payload: serde_json::from_value(entry.get("payload").cloned()?).ok()?,
                })
            })
            .collect())
    }

    async fn ping(&self) -> bool {
        self.request(reqwest::Method::GET, "/collections").send().await.map(|r| r.status().is_success()).unwrap_or(false)
    }
}

fn qdrant_filter(filter: &Filter) -> serde_json::Value {
    let must: Vec<_> = filter
        .must_equal
        .iter()
        .map(|(k, v)| json!({ "key": k, "match": { "value": v } }))
        .collect();
    json!({ "must": must })
}

fn parse_points(raw: serde_json::Value) -> KbResult<Vec<Point>> {
    let entries = raw.as_array().cloned().unwrap_or_default();
    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_str()?.to_string();
            let payload = serde_json::from_value(entry.get("payload").cloned().unwrap_or_default()).ok()?;
            Some(Point { id, vectors: Default::default(), payload })
        })
        .collect())
}
