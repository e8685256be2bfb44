pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use app::app;
pub use error::ApiError;
pub use state::AppState;
