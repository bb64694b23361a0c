//! Request/response types for every endpoint, validation, rate limiting,
//! actor authorization, name→UUID canonicalization, and the `axum` router
//! that serves them.

pub mod auth;
pub mod config;
pub mod envelope;
pub mod handlers;
pub mod pipeline;
pub mod rate_limit;
pub mod router;
pub mod state;

pub use config::Config;
pub use state::AppState;
