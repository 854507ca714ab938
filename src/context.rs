/// Application context and dependency injection
use crate::{
    cache::{self, TtlStore},
    config::ServerConfig,
    db::{
        self, instances::LocalInstanceSettings, Instance, InstanceStore, PeerStatus, PeerStore,
        UserStore,
    },
    error::{ServerError, ServerResult},
    federation::{
        remote::StubPolicy, DomainValidator, FederationTransport, RemoteResolver,
        SecureHttpClient, TrustPolicyGate,
    },
    identity::{LocalResolver, ResolutionService},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    /// Local instance row as of startup; the federation mode is re-read per request
    pub local_instance: Arc<Instance>,
    pub instances: InstanceStore,
    pub peers: PeerStore,
    pub ttl_store: Arc<dyn TtlStore>,
    pub resolver: Arc<ResolutionService>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directory if it doesn't exist
        if !config.storage.data_directory.exists() {
            tokio::fs::create_dir_all(&config.storage.data_directory)
                .await
                .map_err(|e| {
                    ServerError::Internal(format!(
                        "Failed to create directory {:?}: {}",
                        config.storage.data_directory, e
                    ))
                })?;
        }

        // Initialize database
        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        // TTL store for negative caches and discovery cooldowns
        let ttl_store = cache::build_store(&config.cache).await?;

        // Outbound federation client
        let validator = DomainValidator::new().with_blocked(config.federation.blocked_domains.clone());
        let transport = SecureHttpClient::new(&config.federation.user_agent, validator)
            .map_err(|e| ServerError::Config(e.to_string()))?;

        Self::with_components(config, db, ttl_store, Arc::new(transport)).await
    }

    /// Wire services over an existing pool, TTL store and transport
    ///
    /// Ensures the local instance row and seeds configured peers.
    pub async fn with_components(
        config: ServerConfig,
        db: SqlitePool,
        ttl_store: Arc<dyn TtlStore>,
        transport: Arc<dyn FederationTransport>,
    ) -> ServerResult<Self> {
        let instances = InstanceStore::new(db.clone());
        let peers = PeerStore::new(db.clone());

        let software = format!("federated-identity/{}", config.service.version);
        let local_instance = instances
            .ensure_local(LocalInstanceSettings {
                domain: &config.service.domain,
                public_key: &config.service.public_key,
                name: &config.service.name,
                software: &software,
                federation_mode: config.federation.mode,
            })
            .await?;

        for peer in &config.federation.allowed_peers {
            peers
                .upsert(&local_instance.id, peer, PeerStatus::Active)
                .await?;
        }

        info!(
            "Local instance {} ({}), federation mode {}, {} seeded peer(s)",
            local_instance.domain,
            local_instance.id,
            local_instance.federation_mode,
            config.federation.allowed_peers.len()
        );

        let validator = DomainValidator::new().with_blocked(config.federation.blocked_domains.clone());
        let resolver = ResolutionService::new(
            LocalResolver::new(
                UserStore::new(db.clone()),
                local_instance.id.clone(),
                local_instance.domain.clone(),
            ),
            TrustPolicyGate::new(instances.clone(), peers.clone(), local_instance.id.clone()),
            validator,
            RemoteResolver::new(
                db.clone(),
                transport,
                ttl_store.clone(),
                StubPolicy::from_config(&config.federation),
            ),
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            local_instance: Arc::new(local_instance),
            instances,
            peers,
            ttl_store,
            resolver: Arc::new(resolver),
        })
    }

    /// Public domain of this instance
    pub fn domain(&self) -> &str {
        &self.local_instance.domain
    }
}
