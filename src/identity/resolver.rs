/// Resolution Service - entry point turning a handle into a user
use crate::{
    error::ServerResult,
    federation::{
        domain::{normalize, DomainValidator},
        handle::{validate_username, Handle},
        policy::TrustPolicyGate,
        remote::RemoteResolver,
    },
    identity::{LocalResolver, ResolvedUser},
    metrics,
};
use tracing::debug;

/// Handle resolution service
///
/// Resolution order:
/// 1. Parse the handle and validate the username
/// 2. No domain, or the local domain: local user store
/// 3. Otherwise: trust gate, then domain validation, then the remote resolver
#[derive(Clone)]
pub struct ResolutionService {
    local: LocalResolver,
    gate: TrustPolicyGate,
    validator: DomainValidator,
    remote: RemoteResolver,
}

impl ResolutionService {
    pub fn new(
        local: LocalResolver,
        gate: TrustPolicyGate,
        validator: DomainValidator,
        remote: RemoteResolver,
    ) -> Self {
        Self {
            local,
            gate,
            validator,
            remote,
        }
    }

    /// Local resolver, for serving-side lookups and registration
    pub fn local(&self) -> &LocalResolver {
        &self.local
    }

    /// Resolve a raw handle
    pub async fn resolve(&self, raw: &str) -> ServerResult<ResolvedUser> {
        let handle = Handle::parse(raw);
        let is_local = self.is_local(&handle);

        let result = self.resolve_handle(&handle, is_local).await;

        match &result {
            Ok(resolved) => metrics::record_resolution(resolved.source.as_str(), "success"),
            Err(e) => metrics::record_resolution(if is_local { "local" } else { "remote" }, e.kind()),
        }

        result
    }

    async fn resolve_handle(&self, handle: &Handle, is_local: bool) -> ServerResult<ResolvedUser> {
        validate_username(&handle.username)?;

        let domain = match handle.domain.as_deref() {
            Some(domain) if !is_local => domain,
            _ => return self.local.resolve(&handle.username).await,
        };

        // Authorization precedes any validation or network access
        self.gate.authorize(domain).await?;
        let domain = self.validator.validate(domain)?;

        debug!("Resolving {}@{} remotely", handle.username, domain);
        self.remote.resolve(&handle.username, &domain).await
    }

    fn is_local(&self, handle: &Handle) -> bool {
        handle
            .domain
            .as_deref()
            .map_or(true, |domain| normalize(domain) == self.local.domain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryTtlStore;
    use crate::db::instances::LocalInstanceSettings;
    use crate::db::{create_memory_pool, FederationMode, InstanceStore, PeerStatus, PeerStore, UserStore};
    use crate::error::ServerError;
    use crate::federation::remote::StubPolicy;
    use crate::federation::testing::FakeTransport;
    use crate::identity::ResolutionSource;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    struct Harness {
        service: ResolutionService,
        transport: Arc<FakeTransport>,
        instances: InstanceStore,
        peers: PeerStore,
        local_id: String,
    }

    async fn harness(mode: FederationMode) -> Harness {
        let pool = create_memory_pool().await.unwrap();
        let instances = InstanceStore::new(pool.clone());
        let peers = PeerStore::new(pool.clone());
        let local = instances
            .ensure_local(LocalInstanceSettings {
                domain: "home.example",
                public_key: "key",
                name: "Home",
                software: "federated-identity/0.1.0",
                federation_mode: mode,
            })
            .await
            .unwrap();

        let transport = Arc::new(FakeTransport::new());
        transport.respond_json(
            "https://remote.example/.well-known/federation",
            StatusCode::OK,
            json!({
                "instance_id": "r1",
                "domain": "remote.example",
                "public_key": "k",
                "name": "Remote",
                "software": "other/2.0",
                "federation_mode": "open"
            }),
        );
        transport.respond_json(
            "https://remote.example/federation/v1/users/lookup?username=alice",
            StatusCode::OK,
            json!({"id": "ru1", "username": "alice"}),
        );

        let service = ResolutionService::new(
            LocalResolver::new(UserStore::new(pool.clone()), local.id.clone(), local.domain),
            TrustPolicyGate::new(instances.clone(), peers.clone(), local.id.clone()),
            DomainValidator::new(),
            RemoteResolver::new(
                pool,
                transport.clone(),
                Arc::new(MemoryTtlStore::new()),
                StubPolicy::default(),
            ),
        );

        Harness {
            service,
            transport,
            instances,
            peers,
            local_id: local.id,
        }
    }

    #[tokio::test]
    async fn test_local_handle_forms_are_equivalent() {
        let h = harness(FederationMode::Closed).await;
        let created = h.service.local().create_local_user("alice", None).await.unwrap();

        for raw in ["alice", "@alice", "alice@home.example", "@Alice@HOME.Example", "alice@home.example."] {
            let resolved = h.service.resolve(raw).await.unwrap();
            assert_eq!(resolved.user, created, "{}", raw);
            assert_eq!(resolved.source, ResolutionSource::Local);
        }
        assert_eq!(h.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_username_fails_before_anything_else() {
        let h = harness(FederationMode::Open).await;

        for raw in ["", "@", "@@alice", "bad name@remote.example"] {
            assert!(
                matches!(h.service.resolve(raw).await, Err(ServerError::InvalidHandle(_))),
                "{}",
                raw
            );
        }
        assert_eq!(h.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_closed_federation_makes_no_network_calls() {
        let h = harness(FederationMode::Closed).await;

        for raw in ["alice@remote.example", "alice@127.0.0.1", "alice@"] {
            assert!(matches!(
                h.service.resolve(raw).await,
                Err(ServerError::FederationDisabled)
            ));
        }
        assert_eq!(h.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_allowlist_requires_active_peer() {
        let h = harness(FederationMode::Allowlist).await;

        assert!(matches!(
            h.service.resolve("alice@remote.example").await,
            Err(ServerError::PeerNotAllowed(_))
        ));
        assert_eq!(h.transport.calls(), 0);

        h.peers
            .upsert(&h.local_id, "remote.example", PeerStatus::Active)
            .await
            .unwrap();
        let resolved = h.service.resolve("alice@remote.example").await.unwrap();
        assert_eq!(resolved.source, ResolutionSource::Remote);
    }

    #[tokio::test]
    async fn test_unsafe_domains_rejected_without_network() {
        let h = harness(FederationMode::Open).await;

        for raw in [
            "alice@localhost",
            "alice@127.0.0.1",
            "alice@10.0.0.5",
            "alice@169.254.1.1",
            "alice@::1",
            "alice@bad_label.example",
            "alice@",
        ] {
            assert!(
                matches!(h.service.resolve(raw).await, Err(ServerError::InvalidDomain(_))),
                "{}",
                raw
            );
        }
        assert_eq!(h.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_remote_resolution_is_case_insensitive() {
        let h = harness(FederationMode::Open).await;

        let first = h.service.resolve("@Alice@Remote.EXAMPLE").await.unwrap();
        let second = h.service.resolve("@alice@remote.example").await.unwrap();

        assert_eq!(first.user, second.user);
        assert_eq!(first.domain, "remote.example");
        assert_eq!(second.source, ResolutionSource::Cache);
    }

    #[tokio::test]
    async fn test_mode_change_applies_to_next_resolution() {
        let h = harness(FederationMode::Open).await;
        h.service.resolve("alice@remote.example").await.unwrap();

        h.instances
            .set_federation_mode(&h.local_id, FederationMode::Closed)
            .await
            .unwrap();
        assert!(matches!(
            h.service.resolve("alice@remote.example").await,
            Err(ServerError::FederationDisabled)
        ));
    }
}
