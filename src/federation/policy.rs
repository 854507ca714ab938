/// Trust policy gate
///
/// Decides whether this instance may talk to a remote domain at all. Runs
/// before domain validation, before the stub cache and before any network
/// access.
use crate::db::{FederationMode, InstanceStore, PeerStore};
use crate::error::{ServerError, ServerResult};
use crate::federation::domain::normalize;
use tracing::debug;

/// Gate over the local instance's federation mode and peer allow-list
#[derive(Clone)]
pub struct TrustPolicyGate {
    instances: InstanceStore,
    peers: PeerStore,
    local_instance_id: String,
}

impl TrustPolicyGate {
    pub fn new(instances: InstanceStore, peers: PeerStore, local_instance_id: String) -> Self {
        Self {
            instances,
            peers,
            local_instance_id,
        }
    }

    /// Authorize a remote resolution against `domain`
    ///
    /// The mode is read on every call so changes apply immediately.
    pub async fn authorize(&self, domain: &str) -> ServerResult<()> {
        let mode = self.instances.federation_mode(&self.local_instance_id).await?;
        let domain = normalize(domain);

        match mode {
            FederationMode::Closed => {
                debug!("Federation closed, refusing remote resolution for {}", domain);
                Err(ServerError::FederationDisabled)
            }
            FederationMode::Allowlist => {
                if self.peers.is_active(&self.local_instance_id, &domain).await? {
                    Ok(())
                } else {
                    debug!("{} is not an active federation peer", domain);
                    Err(ServerError::PeerNotAllowed(domain))
                }
            }
            FederationMode::Open => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::instances::LocalInstanceSettings;
    use crate::db::{create_memory_pool, PeerStatus};

    async fn gate(mode: FederationMode) -> (TrustPolicyGate, PeerStore, InstanceStore, String) {
        let pool = create_memory_pool().await.unwrap();
        let instances = InstanceStore::new(pool.clone());
        let peers = PeerStore::new(pool);
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

        let gate = TrustPolicyGate::new(instances.clone(), peers.clone(), local.id.clone());
        (gate, peers, instances, local.id)
    }

    #[tokio::test]
    async fn test_open_mode_permits() {
        let (gate, _, _, _) = gate(FederationMode::Open).await;
        assert!(gate.authorize("anyone.example").await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_mode_rejects_everything() {
        let (gate, peers, _, local_id) = gate(FederationMode::Closed).await;
        peers.upsert(&local_id, "friend.example", PeerStatus::Active).await.unwrap();

        let err = gate.authorize("friend.example").await.unwrap_err();
        assert!(matches!(err, ServerError::FederationDisabled));
    }

    #[tokio::test]
    async fn test_allowlist_requires_active_peer() {
        let (gate, peers, _, local_id) = gate(FederationMode::Allowlist).await;

        let err = gate.authorize("friend.example").await.unwrap_err();
        assert!(matches!(err, ServerError::PeerNotAllowed(_)));

        peers.upsert(&local_id, "friend.example", PeerStatus::Pending).await.unwrap();
        assert!(gate.authorize("friend.example").await.is_err());

        peers.upsert(&local_id, "friend.example", PeerStatus::Active).await.unwrap();
        assert!(gate.authorize("Friend.Example.").await.is_ok());
    }

    #[tokio::test]
    async fn test_mode_changes_apply_immediately() {
        let (gate, _, instances, local_id) = gate(FederationMode::Open).await;
        assert!(gate.authorize("remote.example").await.is_ok());

        instances
            .set_federation_mode(&local_id, FederationMode::Closed)
            .await
            .unwrap();
        assert!(matches!(
            gate.authorize("remote.example").await,
            Err(ServerError::FederationDisabled)
        ));
    }
}
