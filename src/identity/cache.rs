/// Stub cache - freshness policy over cached remote user records
use crate::{
    db::{User, UserStore},
    error::ServerResult,
    metrics,
};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of a stub cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Stub exists and is within its TTL
    Fresh(User),
    /// Stub exists but should be re-fetched; usable if the re-fetch fails
    Stale(User),
    Miss,
}

/// Stub cache manager
#[derive(Clone)]
pub struct StubCache {
    users: UserStore,
    /// Freshness window for stubs (`None` = never stale)
    ttl: Option<Duration>,
}

impl StubCache {
    /// Create a new stub cache
    pub fn new(users: UserStore, ttl: Option<Duration>) -> Self {
        Self { users, ttl }
    }

    /// Look up the stub for `username@domain`
    pub async fn lookup(&self, username: &str, domain: &str) -> ServerResult<CacheLookup> {
        let lookup = match self.users.find_stub(username, domain).await? {
            Some(user) => self.classify(user, Utc::now()),
            None => CacheLookup::Miss,
        };

        metrics::record_cache_access("user_stub", matches!(lookup, CacheLookup::Fresh(_)));
        Ok(lookup)
    }

    fn classify(&self, user: User, now: DateTime<Utc>) -> CacheLookup {
        let Some(ttl) = self.ttl else {
            return CacheLookup::Fresh(user);
        };

        // Clock skew can put updated_at in the future; treat that as age zero
        let age = (now - user.updated_at).to_std().unwrap_or_default();
        if age < ttl {
            CacheLookup::Fresh(user)
        } else {
            CacheLookup::Stale(user)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_memory_pool;
    use chrono::Duration as ChronoDuration;

    fn user(updated_at: DateTime<Utc>) -> User {
        User {
            id: "u1".to_string(),
            remote_user_id: Some("remote-u1".to_string()),
            instance_id: "i1".to_string(),
            username: "alice".to_string(),
            display_name: None,
            avatar_id: None,
            bio: None,
            created_at: updated_at,
            updated_at,
        }
    }

    async fn cache(ttl: Option<Duration>) -> StubCache {
        let pool = create_memory_pool().await.unwrap();
        StubCache::new(UserStore::new(pool), ttl)
    }

    #[tokio::test]
    async fn test_classify_by_age() {
        let cache = cache(Some(Duration::from_secs(3600))).await;
        let now = Utc::now();

        assert!(matches!(
            cache.classify(user(now - ChronoDuration::minutes(5)), now),
            CacheLookup::Fresh(_)
        ));
        assert!(matches!(
            cache.classify(user(now - ChronoDuration::hours(2)), now),
            CacheLookup::Stale(_)
        ));
        assert!(matches!(
            cache.classify(user(now + ChronoDuration::minutes(1)), now),
            CacheLookup::Fresh(_)
        ));
    }

    #[tokio::test]
    async fn test_unbounded_ttl_is_always_fresh() {
        let cache = cache(None).await;
        let now = Utc::now();

        assert!(matches!(
            cache.classify(user(now - ChronoDuration::days(365)), now),
            CacheLookup::Fresh(_)
        ));
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let cache = cache(None).await;
        assert_eq!(
            cache.lookup("nobody", "remote.example").await.unwrap(),
            CacheLookup::Miss
        );
    }
}
