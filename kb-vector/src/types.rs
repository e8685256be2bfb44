use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A dense embedding vector of dimension D.
pub type DenseVector = Vec<f32>;

/// A sparse (BM25-like) vector: index -> weight.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

/// A late-interaction vector: T tokens x D' dims, max-sim scored.
pub type LateInteractionVector = Vec<Vec<f32>>;

/// The three named vectors carried by every point (spec.md §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vectors {
    pub dense: DenseVector,
    pub sparse: SparseVector,
    pub late_interaction: LateInteractionVector,
}

/// A JSON-representable payload. Caller-supplied `extra_data` is merged
/// under a stable schema; non-object `extra_data` is coerced to an empty
/// object with a warning at the call site.
pub type Payload = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub vectors: Vectors,
    pub payload: Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub distance: f32,
    pub payload: Payload,
}

/// A scroll filter expression: all conditions are AND-ed together, each one
/// an exact-match on a payload field. Sufficient for the `{status, type,
/// job_id, source}` payload indexes named in spec.md §4.4.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    pub must_equal: BTreeMap<String, serde_json::Value>,
}

impl Filter {
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.must_equal.insert(field.into(), value.into());
        self
    }

    pub fn matches(&self, payload: &Payload) -> bool {
        self.must_equal.iter().all(|(k, v)| payload.get(k) == Some(v))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollPage {
    pub points: Vec<Point>,
    pub next_offset: Option<String>,
}

/// Collection schema parameters (spec.md §4.4 "Ensure-collection").
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub dense_size: usize,
    pub late_interaction_dim: usize,
    pub payload_indexes: Vec<&'static str>,
}

impl Default for CollectionSchema {
    fn default() -> Self {
        Self {
            dense_size: 1536,
            late_interaction_dim: 128,
            payload_indexes: vec!["status", "type", "job_id", "source"],
        }
    }
}
