/// Identity Resolution System
///
/// Turns a user-supplied handle into a stored user record, locally or through
/// a federated lookup, with a freshness-aware cache of remote stubs.

pub mod cache;
pub mod local;
pub mod resolver;

pub use cache::{CacheLookup, StubCache};
pub use local::LocalResolver;
pub use resolver::ResolutionService;

use crate::db::User;
use serde::Serialize;

/// Where a resolved identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Local user store
    Local,
    /// Fresh remote stub, no network access
    Cache,
    /// Fetched from the remote instance during this call
    Remote,
    /// Stale stub served because the remote could not be reached
    StaleCache,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Local => "local",
            ResolutionSource::Cache => "cache",
            ResolutionSource::Remote => "remote",
            ResolutionSource::StaleCache => "stale_cache",
        }
    }
}

/// Handle resolution result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedUser {
    #[serde(flatten)]
    pub user: User,
    /// Domain of the owning instance
    pub domain: String,
    pub source: ResolutionSource,
}
