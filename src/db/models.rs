/// Database models for instances, users and federation peers
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An instance's policy for inbound federation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FederationMode {
    /// Any domain may federate
    Open,
    /// Only approved peers may federate
    Allowlist,
    /// No federation
    Closed,
}

impl FederationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FederationMode::Open => "open",
            FederationMode::Allowlist => "allowlist",
            FederationMode::Closed => "closed",
        }
    }
}

impl fmt::Display for FederationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown value: {0}")]
pub struct UnknownVariant(pub String);

impl FromStr for FederationMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FederationMode::Open),
            "allowlist" => Ok(FederationMode::Allowlist),
            "closed" => Ok(FederationMode::Closed),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Approval state of a federation peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    Active,
    Pending,
    Revoked,
}

impl PeerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerStatus::Active => "active",
            PeerStatus::Pending => "pending",
            PeerStatus::Revoked => "revoked",
        }
    }
}

impl FromStr for PeerStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PeerStatus::Active),
            "pending" => Ok(PeerStatus::Pending),
            "revoked" => Ok(PeerStatus::Revoked),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Instance record (local or cached remote projection)
#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    /// Locally assigned id, stable for the lifetime of the row
    pub id: String,
    pub domain: String,
    /// Id the remote instance declared about itself during discovery
    pub remote_instance_id: Option<String>,
    pub public_key: String,
    pub name: String,
    pub software: String,
    pub federation_mode: FederationMode,
    pub is_local: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Instance {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let mode: String = row.try_get("federation_mode")?;

        Ok(Self {
            id: row.try_get("id")?,
            domain: row.try_get("domain")?,
            remote_instance_id: row.try_get("remote_instance_id")?,
            public_key: row.try_get("public_key")?,
            name: row.try_get("name")?,
            software: row.try_get("software")?,
            federation_mode: mode
                .parse()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            is_local: row.try_get("is_local")?,
            created_at: row.try_get("created_at")?,
            last_seen_at: row.try_get("last_seen_at")?,
        })
    }
}

/// User record; a stub when `instance_id` refers to a remote instance
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub instance_id: String,
    /// Id assigned by the owning instance; only set on stubs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_user_id: Option<String>,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_id: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Allow-list entry for a peer domain
#[derive(Debug, Clone, Serialize)]
pub struct FederationPeer {
    pub instance_id: String,
    pub peer_domain: String,
    pub status: PeerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for FederationPeer {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;

        Ok(Self {
            instance_id: row.try_get("instance_id")?,
            peer_domain: row.try_get("peer_domain")?,
            status: status
                .parse()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
