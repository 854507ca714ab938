/// Federation peer allow-list
use crate::db::models::{FederationPeer, PeerStatus};
use crate::error::ServerResult;
use chrono::Utc;
use sqlx::SqlitePool;

/// Peer store
#[derive(Clone)]
pub struct PeerStore {
    db: SqlitePool,
}

impl PeerStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Add a peer or change its status
    pub async fn upsert(
        &self,
        instance_id: &str,
        peer_domain: &str,
        status: PeerStatus,
    ) -> ServerResult<FederationPeer> {
        let now = Utc::now();

        let peer = sqlx::query_as::<_, FederationPeer>(
            r#"
            INSERT INTO federation_peers (instance_id, peer_domain, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(instance_id, peer_domain) DO UPDATE SET
                status = excluded.status,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(instance_id)
        .bind(peer_domain.to_ascii_lowercase())
        .bind(status.as_str())
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        Ok(peer)
    }

    /// Whether `peer_domain` is an active peer of `instance_id`
    pub async fn is_active(&self, instance_id: &str, peer_domain: &str) -> ServerResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM federation_peers
            WHERE instance_id = ?1 AND peer_domain = ?2 AND status = 'active'
            "#,
        )
        .bind(instance_id)
        .bind(peer_domain)
        .fetch_optional(&self.db)
        .await?;

        Ok(found.is_some())
    }

    /// List all peers of an instance
    pub async fn list(&self, instance_id: &str) -> ServerResult<Vec<FederationPeer>> {
        let peers = sqlx::query_as::<_, FederationPeer>(
            "SELECT * FROM federation_peers WHERE instance_id = ?1 ORDER BY peer_domain",
        )
        .bind(instance_id)
        .fetch_all(&self.db)
        .await?;

        Ok(peers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::FederationMode;
    use crate::db::{create_memory_pool, instances::LocalInstanceSettings, InstanceStore};

    async fn setup() -> (PeerStore, String) {
        let pool = create_memory_pool().await.unwrap();
        let local = InstanceStore::new(pool.clone())
            .ensure_local(LocalInstanceSettings {
                domain: "home.example",
                public_key: "key",
                name: "Home",
                software: "federated-identity/0.1.0",
                federation_mode: FederationMode::Allowlist,
            })
            .await
            .unwrap();
        (PeerStore::new(pool), local.id)
    }

    #[tokio::test]
    async fn test_active_peer_lookup_is_case_insensitive() {
        let (peers, instance_id) = setup().await;

        peers.upsert(&instance_id, "Friend.Example", PeerStatus::Active).await.unwrap();

        assert!(peers.is_active(&instance_id, "friend.example").await.unwrap());
        assert!(peers.is_active(&instance_id, "FRIEND.EXAMPLE").await.unwrap());
        assert!(!peers.is_active(&instance_id, "stranger.example").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_active_status_is_not_allowed() {
        let (peers, instance_id) = setup().await;

        peers.upsert(&instance_id, "friend.example", PeerStatus::Pending).await.unwrap();
        assert!(!peers.is_active(&instance_id, "friend.example").await.unwrap());

        peers.upsert(&instance_id, "friend.example", PeerStatus::Active).await.unwrap();
        assert!(peers.is_active(&instance_id, "friend.example").await.unwrap());

        peers.upsert(&instance_id, "friend.example", PeerStatus::Revoked).await.unwrap();
        assert!(!peers.is_active(&instance_id, "friend.example").await.unwrap());

        let listed = peers.list(&instance_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, PeerStatus::Revoked);
    }
}
