/// Remote user resolution
///
/// Cache-through lookup of `username@domain` against another instance:
/// stub cache, discovery, scoped lookup, strict decode, then one transaction
/// upserting the instance and the user stub. The instance association always
/// comes from discovery, never from the lookup payload.
use crate::{
    cache::{categories, TtlStore},
    config::FederationConfig,
    db::{
        instances::{upsert_remote, RemoteInstanceRecord},
        users::{upsert_stub, StubRecord},
        FederationMode, User, UserStore,
    },
    error::{ServerError, ServerResult},
    federation::{
        discovery::{DiscoveryDocument, InstanceDiscovery},
        http::FederationTransport,
        LOOKUP_PATH,
    },
    identity::{CacheLookup, ResolutionSource, ResolvedUser, StubCache},
    metrics,
};
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use validator::Validate;

/// User profile as returned by a remote lookup endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RemoteUserPayload {
    #[validate(length(min = 1, max = 128))]
    pub id: String,

    #[validate(length(min = 1, max = 32))]
    pub username: String,

    #[validate(length(max = 128))]
    pub display_name: Option<String>,

    #[validate(length(max = 256))]
    pub avatar_id: Option<String>,

    #[validate(length(max = 2048))]
    pub bio: Option<String>,

    pub created_at: Option<String>,
}

/// Outcome of a lookup call that reached the remote instance
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteLookup {
    Found(RemoteUserPayload),
    /// The remote answered 404: the user does not exist there
    NotFound,
}

/// Freshness and negative-caching windows
#[derive(Debug, Clone, Copy)]
pub struct StubPolicy {
    /// How long a stub is served without re-fetching (`None` = forever)
    pub stub_ttl: Option<Duration>,
    /// How long a remote not-found is remembered
    pub negative_ttl: Duration,
    /// How long a failed discovery suppresses new attempts
    pub discovery_cooldown: Duration,
}

impl StubPolicy {
    pub fn from_config(config: &FederationConfig) -> Self {
        Self {
            stub_ttl: (config.stub_ttl > 0).then(|| Duration::from_secs(config.stub_ttl)),
            negative_ttl: Duration::from_secs(config.negative_ttl),
            discovery_cooldown: Duration::from_secs(config.discovery_cooldown),
        }
    }
}

impl Default for StubPolicy {
    fn default() -> Self {
        Self::from_config(&FederationConfig::default())
    }
}

/// Remote resolver
#[derive(Clone)]
pub struct RemoteResolver {
    db: SqlitePool,
    stubs: StubCache,
    discovery: InstanceDiscovery,
    transport: Arc<dyn FederationTransport>,
    ttl_store: Arc<dyn TtlStore>,
    policy: StubPolicy,
}

impl RemoteResolver {
    pub fn new(
        db: SqlitePool,
        transport: Arc<dyn FederationTransport>,
        ttl_store: Arc<dyn TtlStore>,
        policy: StubPolicy,
    ) -> Self {
        Self {
            stubs: StubCache::new(UserStore::new(db.clone()), policy.stub_ttl),
            discovery: InstanceDiscovery::new(transport.clone()),
            db,
            transport,
            ttl_store,
            policy,
        }
    }

    /// Resolve `username@domain`
    ///
    /// `username` must already be validated and `domain` must already have
    /// passed the trust gate and domain validation.
    pub async fn resolve(&self, username: &str, domain: &str) -> ServerResult<ResolvedUser> {
        let stale = match self.stubs.lookup(username, domain).await? {
            CacheLookup::Fresh(user) => {
                debug!("Stub cache hit for {}@{}", username, domain);
                return Ok(ResolvedUser {
                    user,
                    domain: domain.to_string(),
                    source: ResolutionSource::Cache,
                });
            }
            CacheLookup::Stale(user) => Some(user),
            CacheLookup::Miss => None,
        };

        if self.remembered(&not_found_key(username, domain)).await {
            debug!("Remote recently reported {}@{} as not found", username, domain);
            return Err(ServerError::UserNotFound(format!("{}@{}", username, domain)));
        }

        match (self.fetch_and_store(username, domain).await, stale) {
            (Ok(user), _) => Ok(ResolvedUser {
                user,
                domain: domain.to_string(),
                source: ResolutionSource::Remote,
            }),
            (Err(ServerError::RemoteLookupFailed(_)), Some(user)) => {
                warn!(
                    "Serving stale stub for {}@{} after failed refresh",
                    username, domain
                );
                Ok(ResolvedUser {
                    user,
                    domain: domain.to_string(),
                    source: ResolutionSource::StaleCache,
                })
            }
            (Err(e), _) => Err(e),
        }
    }

    async fn fetch_and_store(&self, username: &str, domain: &str) -> ServerResult<User> {
        let document = self.discover(domain).await?;

        match self.lookup(username, domain).await? {
            RemoteLookup::Found(payload) => self.persist(domain, &document, &payload).await,
            RemoteLookup::NotFound => {
                self.remember(&not_found_key(username, domain), self.policy.negative_ttl)
                    .await;
                Err(ServerError::UserNotFound(format!("{}@{}", username, domain)))
            }
        }
    }

    /// Discover `domain`, refusing instances that do not federate
    async fn discover(&self, domain: &str) -> ServerResult<DiscoveryDocument> {
        let cooldown_key = format!("{}{}", categories::DISCOVERY_FAILURE, domain);
        if self.remembered(&cooldown_key).await {
            debug!("Discovery for {} is cooling down", domain);
            return Err(ServerError::RemoteLookupFailed(domain.to_string()));
        }

        let started = Instant::now();
        let result = self.discovery.discover(domain).await;
        let elapsed = started.elapsed().as_secs_f64();

        let document = match result {
            Ok(document) => document,
            Err(e) => {
                metrics::record_federation_request("discovery", "error", elapsed);
                warn!("Discovery failed for {}: {}", domain, e);
                self.remember(&cooldown_key, self.policy.discovery_cooldown).await;
                return Err(ServerError::RemoteLookupFailed(domain.to_string()));
            }
        };
        metrics::record_federation_request("discovery", "ok", elapsed);

        if document.federation_mode == FederationMode::Closed {
            warn!("{} declares federation closed, not querying it", domain);
            self.remember(&cooldown_key, self.policy.discovery_cooldown).await;
            return Err(ServerError::RemoteLookupFailed(domain.to_string()));
        }

        Ok(document)
    }

    /// Issue the scoped user lookup and decode the answer
    ///
    /// Usernames compare case-insensitively, so the query is always lowercase.
    async fn lookup(&self, username: &str, domain: &str) -> ServerResult<RemoteLookup> {
        let url = lookup_url(domain, &username.to_ascii_lowercase())?;

        let started = Instant::now();
        let result = self.transport.get(url).await;
        let elapsed = started.elapsed().as_secs_f64();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::record_federation_request("lookup", "error", elapsed);
                warn!("Lookup of {} on {} failed: {}", username, domain, e);
                return Err(ServerError::RemoteLookupFailed(domain.to_string()));
            }
        };
        metrics::record_federation_request("lookup", response.status.as_str(), elapsed);

        match response.status {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(RemoteLookup::NotFound),
            status => {
                warn!("Lookup of {} on {} returned {}", username, domain, status);
                return Err(ServerError::RemoteLookupFailed(domain.to_string()));
            }
        }

        decode_payload(&response.body, username).map(RemoteLookup::Found).map_err(|reason| {
            warn!("Rejected lookup payload from {}: {}", domain, reason);
            ServerError::RemoteLookupFailed(domain.to_string())
        })
    }

    /// Upsert instance and stub together; either both rows are written or neither
    async fn persist(
        &self,
        domain: &str,
        document: &DiscoveryDocument,
        payload: &RemoteUserPayload,
    ) -> ServerResult<User> {
        let now = Utc::now();
        let created_at = payload.created_at.as_deref().and_then(parse_remote_timestamp);

        let mut tx = self.db.begin().await?;

        let instance = upsert_remote(
            &mut *tx,
            &RemoteInstanceRecord {
                domain,
                remote_instance_id: &document.instance_id,
                public_key: &document.public_key,
                name: &document.name,
                software: &document.software,
                federation_mode: document.federation_mode,
            },
            now,
        )
        .await?;

        let user = upsert_stub(
            &mut *tx,
            &instance.id,
            &StubRecord {
                remote_id: &payload.id,
                username: &payload.username,
                display_name: payload.display_name.as_deref(),
                avatar_id: payload.avatar_id.as_deref(),
                bio: payload.bio.as_deref(),
                created_at,
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!("Cached remote user {}@{}", user.username, domain);
        Ok(user)
    }

    async fn remembered(&self, key: &str) -> bool {
        match self.ttl_store.get(key).await {
            Ok(value) => value.is_some(),
            Err(e) => {
                warn!("TTL store read failed for {}: {}", key, e);
                false
            }
        }
    }

    async fn remember(&self, key: &str, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        if let Err(e) = self.ttl_store.set_with_ttl(key, "1", ttl).await {
            warn!("TTL store write failed for {}: {}", key, e);
        }
    }
}

/// Lookup URL for `username` on `domain`
pub fn lookup_url(domain: &str, username: &str) -> ServerResult<Url> {
    Url::parse(&format!(
        "https://{}{}?username={}",
        domain,
        LOOKUP_PATH,
        urlencoding::encode(username)
    ))
    .map_err(|_| ServerError::InvalidDomain(domain.to_string()))
}

fn not_found_key(username: &str, domain: &str) -> String {
    format!(
        "{}{}/{}",
        categories::LOOKUP_MISS,
        domain,
        username.to_ascii_lowercase()
    )
}

/// Strictly decode a lookup body for the requested username
fn decode_payload(body: &[u8], requested: &str) -> Result<RemoteUserPayload, String> {
    let payload: RemoteUserPayload = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    payload.validate().map_err(|e| e.to_string())?;

    if !payload.username.eq_ignore_ascii_case(requested) {
        return Err(format!(
            "payload describes {:?}, requested {:?}",
            payload.username, requested
        ));
    }

    Ok(payload)
}

/// Parse a remote timestamp; anything unparseable yields `None`
fn parse_remote_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
