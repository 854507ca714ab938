/// Local Resolver - lookups against this instance's own users
use crate::{
    db::{User, UserStore},
    error::{ServerError, ServerResult},
    federation::handle::validate_username,
    identity::{ResolutionSource, ResolvedUser},
};
use tracing::info;

/// Resolver for users owned by the local instance
#[derive(Clone)]
pub struct LocalResolver {
    users: UserStore,
    instance_id: String,
    domain: String,
}

impl LocalResolver {
    pub fn new(users: UserStore, instance_id: String, domain: String) -> Self {
        Self {
            users,
            instance_id,
            domain,
        }
    }

    /// Domain of the local instance
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Find a local user by case-insensitive username
    pub async fn resolve(&self, username: &str) -> ServerResult<ResolvedUser> {
        let user = self
            .find(username)
            .await?
            .ok_or_else(|| ServerError::UserNotFound(username.to_string()))?;

        Ok(ResolvedUser {
            user,
            domain: self.domain.clone(),
            source: ResolutionSource::Local,
        })
    }

    /// Find a local user, `None` on a miss
    pub async fn find(&self, username: &str) -> ServerResult<Option<User>> {
        self.users.find_by_username(&self.instance_id, username).await
    }

    /// Register a new local user
    pub async fn create_local_user(
        &self,
        username: &str,
        display_name: Option<&str>,
    ) -> ServerResult<User> {
        validate_username(username)?;

        let user = self
            .users
            .create(&self.instance_id, username, display_name)
            .await?;

        info!("Created local user {}@{}", user.username, self.domain);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::instances::LocalInstanceSettings;
    use crate::db::{create_memory_pool, FederationMode, InstanceStore};

    async fn resolver() -> LocalResolver {
        let pool = create_memory_pool().await.unwrap();
        let local = InstanceStore::new(pool.clone())
            .ensure_local(LocalInstanceSettings {
                domain: "home.example",
                public_key: "key",
                name: "Home",
                software: "federated-identity/0.1.0",
                federation_mode: FederationMode::Open,
            })
            .await
            .unwrap();

        LocalResolver::new(UserStore::new(pool), local.id, local.domain)
    }

    #[tokio::test]
    async fn test_resolve_is_case_insensitive() {
        let resolver = resolver().await;
        let created = resolver.create_local_user("Alice", Some("Alice")).await.unwrap();

        let resolved = resolver.resolve("alice").await.unwrap();
        assert_eq!(resolved.user, created);
        assert_eq!(resolved.domain, "home.example");
        assert_eq!(resolved.source, ResolutionSource::Local);

        assert_eq!(resolver.resolve("ALICE").await.unwrap().user, created);
    }

    #[tokio::test]
    async fn test_resolve_miss() {
        let resolver = resolver().await;
        assert!(matches!(
            resolver.resolve("ghost").await,
            Err(ServerError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_validates_and_rejects_duplicates() {
        let resolver = resolver().await;

        assert!(matches!(
            resolver.create_local_user("bad name", None).await,
            Err(ServerError::InvalidHandle(_))
        ));

        resolver.create_local_user("bob", None).await.unwrap();
        assert!(matches!(
            resolver.create_local_user("BOB", None).await,
            Err(ServerError::Conflict(_))
        ));
    }
}
