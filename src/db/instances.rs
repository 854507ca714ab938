/// Instance records: the local instance and cached remote projections
use crate::db::models::{FederationMode, Instance};
use crate::error::{ServerError, ServerResult};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Remote instance metadata obtained from discovery, ready to persist
#[derive(Debug, Clone)]
pub struct RemoteInstanceRecord<'a> {
    pub domain: &'a str,
    pub remote_instance_id: &'a str,
    pub public_key: &'a str,
    pub name: &'a str,
    pub software: &'a str,
    pub federation_mode: FederationMode,
}

/// Local instance settings applied at startup
#[derive(Debug, Clone)]
pub struct LocalInstanceSettings<'a> {
    pub domain: &'a str,
    pub public_key: &'a str,
    pub name: &'a str,
    pub software: &'a str,
    pub federation_mode: FederationMode,
}

/// Instance store
#[derive(Clone)]
pub struct InstanceStore {
    db: SqlitePool,
}

impl InstanceStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create or refresh the row describing this instance
    pub async fn ensure_local(&self, settings: LocalInstanceSettings<'_>) -> ServerResult<Instance> {
        let now = Utc::now();
        let domain = settings.domain.to_ascii_lowercase();

        let instance = sqlx::query_as::<_, Instance>(
            r#"
            INSERT INTO instances
                (id, domain, remote_instance_id, public_key, name, software,
                 federation_mode, is_local, created_at, last_seen_at)
            VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, 1, ?7, ?7)
            ON CONFLICT(domain) DO UPDATE SET
                public_key = excluded.public_key,
                name = excluded.name,
                software = excluded.software,
                federation_mode = excluded.federation_mode,
                is_local = 1,
                last_seen_at = excluded.last_seen_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&domain)
        .bind(settings.public_key)
        .bind(settings.name)
        .bind(settings.software)
        .bind(settings.federation_mode.as_str())
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        Ok(instance)
    }

    /// Get the local instance row
    pub async fn get_local(&self) -> ServerResult<Instance> {
        sqlx::query_as::<_, Instance>("SELECT * FROM instances WHERE is_local = 1 LIMIT 1")
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ServerError::Internal("Local instance is not initialized".to_string()))
    }

    /// Read an instance's current federation mode
    pub async fn federation_mode(&self, instance_id: &str) -> ServerResult<FederationMode> {
        let mode: Option<String> =
            sqlx::query_scalar("SELECT federation_mode FROM instances WHERE id = ?1")
                .bind(instance_id)
                .fetch_optional(&self.db)
                .await?;

        let mode = mode.ok_or_else(|| {
            ServerError::Internal(format!("Instance {} does not exist", instance_id))
        })?;

        mode.parse()
            .map_err(|e| ServerError::Internal(format!("Invalid federation mode: {}", e)))
    }

    /// Change an instance's federation mode
    pub async fn set_federation_mode(
        &self,
        instance_id: &str,
        mode: FederationMode,
    ) -> ServerResult<()> {
        let result = sqlx::query("UPDATE instances SET federation_mode = ?1 WHERE id = ?2")
            .bind(mode.as_str())
            .bind(instance_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::Internal(format!(
                "Instance {} does not exist",
                instance_id
            )));
        }

        Ok(())
    }
}

/// Insert or refresh a remote instance keyed by domain
///
/// Runs on the caller's connection so it can share a transaction with the
/// user stub upsert. The local row is never touched: a conflict with it
/// yields no returned row and an error.
pub async fn upsert_remote(
    conn: &mut SqliteConnection,
    record: &RemoteInstanceRecord<'_>,
    now: DateTime<Utc>,
) -> ServerResult<Instance> {
    let domain = record.domain.to_ascii_lowercase();

    let instance = sqlx::query_as::<_, Instance>(
        r#"
        INSERT INTO instances
            (id, domain, remote_instance_id, public_key, name, software,
             federation_mode, is_local, created_at, last_seen_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)
        ON CONFLICT(domain) DO UPDATE SET
            remote_instance_id = excluded.remote_instance_id,
            public_key = excluded.public_key,
            name = excluded.name,
            software = excluded.software,
            federation_mode = excluded.federation_mode,
            last_seen_at = excluded.last_seen_at
        WHERE instances.is_local = 0
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&domain)
    .bind(record.remote_instance_id)
    .bind(record.public_key)
    .bind(record.name)
    .bind(record.software)
    .bind(record.federation_mode.as_str())
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    instance.ok_or_else(|| {
        ServerError::Internal(format!(
            "Refusing to overwrite local instance record for {}",
            domain
        ))
    })
}
