pub mod brute_force;
pub mod keygen;
pub mod rate_limit;
pub mod service;
pub mod types;
pub mod validate;

pub use keygen::{generate_api_key, mask_api_key};
pub use rate_limit::{check_rate_limit, RateLimitDecision};
pub use service::AuthService;
pub use types::{ApiKeyRecord, AuthContext, Tier};
pub use validate::{store_api_key, validate_api_key};
