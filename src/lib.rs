/// Federated identity resolution
///
/// Resolves handles (`username` or `username@domain`) to user records for a
/// multi-instance messaging server: locally when the handle belongs to this
/// instance, otherwise through a trust-gated, SSRF-hardened and cached lookup
/// against the owning instance.

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod federation;
pub mod identity;
pub mod jobs;
pub mod metrics;
pub mod server;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{ServerError, ServerResult};
