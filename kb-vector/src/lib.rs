pub mod cached;
pub mod memory;
pub mod qdrant;
pub mod store;
pub mod types;

pub use cached::CachedVectorStore;
pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantVectorStore;
pub use store::VectorStore;
pub use types::{
    CollectionSchema, DenseVector, Filter, LateInteractionVector, Payload, Point, ScrollPage,
    SearchHit, SparseVector, Vectors,
};
