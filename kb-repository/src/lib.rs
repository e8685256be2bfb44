//! kb-repository: job record storage behind a single [`JobRepository`]
//! contract (spec.md §4.5), with KV, relational, and vector-backed
//! implementations selected per deployment.

pub mod kv;
pub mod record;
pub mod trait_def;
pub mod vector;

#[cfg(feature = "relational-backend")]
pub mod relational;

pub use kv::KvJobRepository;
pub use record::JobRecord;
pub use trait_def::JobRepository;
pub use vector::VectorJobRepository;

#[cfg(feature = "relational-backend")]
pub use relational::RelationalJobRepository;
