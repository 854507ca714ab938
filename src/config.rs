/// Configuration management for the federated identity server
use crate::db::FederationMode;
use crate::error::{ServerError, ServerResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub federation: FederationConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Public domain of this instance; handles with this domain resolve locally
    pub domain: String,
    pub bind_address: String,
    pub port: u16,
    pub name: String,
    pub public_key: String,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Federation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Federation mode applied to the local instance at startup
    pub mode: FederationMode,
    /// Domains seeded as active peers at startup
    pub allowed_peers: Vec<String>,
    /// Operator deny-list, matched as domain suffixes
    pub blocked_domains: Vec<String>,
    pub user_agent: String,
    /// Seconds a cached remote stub stays fresh (0 = forever)
    pub stub_ttl: u64,
    /// Seconds a remote not-found answer is remembered
    pub negative_ttl: u64,
    /// Seconds a failed discovery suppresses new attempts for that domain
    pub discovery_cooldown: u64,
}

/// Backend for the TTL store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

/// TTL store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub redis_url: String,
    /// Key prefix for all cache entries
    pub key_prefix: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            mode: FederationMode::Open,
            allowed_peers: vec![],
            blocked_domains: vec![],
            user_agent: format!("federated-identity/{}", env!("CARGO_PKG_VERSION")),
            stub_ttl: 86400,
            negative_ttl: 60,
            discovery_cooldown: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "federation:".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ServerResult<Self> {
        dotenv::dotenv().ok();

        let domain = env::var("INSTANCE_DOMAIN")
            .map_err(|_| ServerError::Config("INSTANCE_DOMAIN is required".to_string()))?
            .trim()
            .trim_end_matches('.')
            .to_ascii_lowercase();
        let bind_address =
            env::var("INSTANCE_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("INSTANCE_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ServerError::Config("Invalid port number".to_string()))?;
        let name = env::var("INSTANCE_NAME").unwrap_or_else(|_| domain.clone());
        let public_key = env::var("INSTANCE_PUBLIC_KEY")
            .map_err(|_| ServerError::Config("INSTANCE_PUBLIC_KEY is required".to_string()))?;
        let version = env!("CARGO_PKG_VERSION").to_string();

        let data_directory: PathBuf = env::var("INSTANCE_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("INSTANCE_DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("federation.sqlite"));

        let defaults = FederationConfig::default();
        let mode = match env::var("FEDERATION_MODE") {
            Ok(value) => value
                .parse()
                .map_err(|e| ServerError::Config(format!("Invalid FEDERATION_MODE: {}", e)))?,
            Err(_) => defaults.mode,
        };

        let federation = FederationConfig {
            mode,
            allowed_peers: parse_list(&env::var("FEDERATION_ALLOWED_PEERS").unwrap_or_default()),
            blocked_domains: parse_list(
                &env::var("FEDERATION_BLOCKED_DOMAINS").unwrap_or_default(),
            ),
            user_agent: env::var("FEDERATION_USER_AGENT").unwrap_or(defaults.user_agent),
            stub_ttl: env::var("FEDERATION_STUB_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.stub_ttl),
            negative_ttl: env::var("FEDERATION_NEGATIVE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.negative_ttl),
            discovery_cooldown: env::var("FEDERATION_DISCOVERY_COOLDOWN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.discovery_cooldown),
        };

        let cache_defaults = CacheConfig::default();
        let backend = match env::var("CACHE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => CacheBackend::Memory,
            "redis" => CacheBackend::Redis,
            other => {
                return Err(ServerError::Config(format!(
                    "Unknown CACHE_BACKEND: {}",
                    other
                )))
            }
        };
        let cache = CacheConfig {
            backend,
            redis_url: env::var("REDIS_URL").unwrap_or(cache_defaults.redis_url),
            key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or(cache_defaults.key_prefix),
        };

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "federated_identity=debug,tower_http=debug".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                domain,
                bind_address,
                port,
                name,
                public_key,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            federation,
            cache,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ServerResult<()> {
        if self.service.domain.is_empty() {
            return Err(ServerError::Config("Domain cannot be empty".to_string()));
        }

        if self.service.public_key.trim().is_empty() {
            return Err(ServerError::Config("Public key cannot be empty".to_string()));
        }

        if self.federation.user_agent.trim().is_empty() {
            return Err(ServerError::Config("User agent cannot be empty".to_string()));
        }

        Ok(())
    }
}

/// Parse a comma-separated list of domains, lowercased and without blanks
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('.').to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
