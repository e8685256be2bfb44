//! kb-core: shared primitives for the knowledge-base job platform.
//!
//! Every other crate in the workspace depends on this one for configuration
//! loading, tenant/owner normalization, the monotonic ID generator, the
//! error taxonomy, the shared job data model, and structured logging setup.

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod idgen;
pub mod logging;
pub mod model;
pub mod tenant;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use context::RequestContext;
pub use error::{KbError, KbResult};
pub use idgen::IdGenerator;
pub use model::{JobPriority, JobStatus, JobType, SourceType};
pub use tenant::{collection_name, knowledge_base_collection, normalize_owner};
