/// User records: local accounts and cached remote stubs
use crate::db::models::User;
use crate::error::{ServerError, ServerResult};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Validated remote profile, ready to persist as a stub
#[derive(Debug, Clone)]
pub struct StubRecord<'a> {
    /// Remote user id, opaque and scoped to the owning instance
    pub remote_id: &'a str,
    pub username: &'a str,
    pub display_name: Option<&'a str>,
    pub avatar_id: Option<&'a str>,
    pub bio: Option<&'a str>,
    /// Remote creation time, when the remote supplied a parseable one
    pub created_at: Option<DateTime<Utc>>,
}

/// User store
#[derive(Clone)]
pub struct UserStore {
    db: SqlitePool,
}

impl UserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register a local user
    pub async fn create(
        &self,
        instance_id: &str,
        username: &str,
        display_name: Option<&str>,
    ) -> ServerResult<User> {
        let now = Utc::now();

        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (id, instance_id, remote_user_id, username, display_name, avatar_id, bio,
                 created_at, updated_at)
            VALUES (?1, ?2, NULL, ?3, ?4, NULL, NULL, ?5, ?5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(instance_id)
        .bind(username)
        .bind(display_name)
        .bind(now)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                ServerError::Conflict(format!("Username {} is already taken", username)),
            ),
            Err(e) => Err(ServerError::Database(e)),
        }
    }

    /// Find a user of one instance by case-insensitive username
    pub async fn find_by_username(
        &self,
        instance_id: &str,
        username: &str,
    ) -> ServerResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE instance_id = ?1 AND username = ?2",
        )
        .bind(instance_id)
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// Find a cached remote stub by (username, domain)
    pub async fn find_stub(&self, username: &str, domain: &str) -> ServerResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.*
            FROM users u
            JOIN instances i ON i.id = u.instance_id
            WHERE i.domain = ?1 AND i.is_local = 0 AND u.username = ?2
            "#,
        )
        .bind(domain.to_ascii_lowercase())
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }
}

/// Insert or refresh a remote user stub keyed by (instance_id, username)
///
/// A remote id maps to at most one stub per instance: a stub holding the same
/// remote id under another username is a renamed user and is dropped first.
/// Display fields are replaced. `created_at` is only replaced when the remote
/// supplied a parseable value; otherwise a new row takes `now`.
pub async fn upsert_stub(
    conn: &mut SqliteConnection,
    instance_id: &str,
    stub: &StubRecord<'_>,
    now: DateTime<Utc>,
) -> ServerResult<User> {
    let renamed = sqlx::query(
        "DELETE FROM users WHERE instance_id = ?1 AND remote_user_id = ?2 AND username <> ?3",
    )
    .bind(instance_id)
    .bind(stub.remote_id)
    .bind(stub.username)
    .execute(&mut *conn)
    .await?;

    if renamed.rows_affected() > 0 {
        tracing::debug!(
            "Dropped {} stub(s) superseded by {} on instance {}",
            renamed.rows_affected(),
            stub.username,
            instance_id
        );
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users
            (id, instance_id, remote_user_id, username, display_name, avatar_id, bio,
             created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, COALESCE(?8, ?9), ?9)
        ON CONFLICT(instance_id, username) DO UPDATE SET
            remote_user_id = excluded.remote_user_id,
            display_name = excluded.display_name,
            avatar_id = excluded.avatar_id,
            bio = excluded.bio,
            created_at = COALESCE(?8, users.created_at),
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(instance_id)
    .bind(stub.remote_id)
    .bind(stub.username)
    .bind(stub.display_name)
    .bind(stub.avatar_id)
    .bind(stub.bio)
    .bind(stub.created_at)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(user)
}
