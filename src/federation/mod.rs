/// Federation support
///
/// Everything that crosses the boundary to another instance:
/// - handle parsing and remote domain validation
/// - the trust policy gate (open / allowlist / closed)
/// - instance discovery and remote user lookups
/// - the SSRF-hardened HTTP client both of them share

pub mod discovery;
pub mod domain;
pub mod handle;
pub mod http;
pub mod policy;
pub mod remote;

pub use discovery::{DiscoveryDocument, DiscoveryError, InstanceDiscovery};
pub use domain::{DomainError, DomainValidator};
pub use handle::Handle;
pub use http::{FederationTransport, FetchedResponse, HttpError, SecureHttpClient};
pub use policy::TrustPolicyGate;
pub use remote::{RemoteLookup, RemoteResolver, RemoteUserPayload, StubPolicy};

/// Path of the discovery document on every instance
pub const DISCOVERY_PATH: &str = "/.well-known/federation";

/// Path of the user lookup endpoint on every instance
pub const LOOKUP_PATH: &str = "/federation/v1/users/lookup";
