//! HTTP facade over the craftdeck environment service
//!
//! Every response is an envelope: `{ "success": true, ...payload }` on success
//! and `{ "success": false, "error": "..." }` otherwise.

pub mod api_docs;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{Config, ConfigError};
pub use error::{ApiError, ApiResult};
pub use routes::create_app;
pub use state::AppState;
