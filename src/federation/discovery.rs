/// Remote instance discovery
///
/// Fetches a remote instance's self-declared metadata from its well-known
/// endpoint. The document is validated strictly; nothing is persisted here.
use crate::db::FederationMode;
use crate::federation::http::{FederationTransport, HttpError};
use crate::federation::DISCOVERY_PATH;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use validator::Validate;

/// Discovery document served at `/.well-known/federation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryDocument {
    #[validate(length(min = 1, max = 128))]
    pub instance_id: String,

    #[validate(length(min = 1, max = 253))]
    pub domain: String,

    #[validate(length(min = 1, max = 4096))]
    pub public_key: String,

    #[validate(length(max = 256))]
    pub name: String,

    #[validate(length(min = 1, max = 128))]
    pub software: String,

    pub federation_mode: FederationMode,
}

/// Discovery failure
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Transport(#[from] HttpError),

    #[error("unexpected status {0}")]
    UnexpectedStatus(StatusCode),

    #[error("malformed discovery document: {0}")]
    Malformed(String),

    #[error("document declares domain {found}, expected {expected}")]
    DomainMismatch { expected: String, found: String },
}

/// Instance discovery service
#[derive(Clone)]
pub struct InstanceDiscovery {
    transport: Arc<dyn FederationTransport>,
}

impl InstanceDiscovery {
    pub fn new(transport: Arc<dyn FederationTransport>) -> Self {
        Self { transport }
    }

    /// Discover an instance by its (already validated) domain
    pub async fn discover(&self, domain: &str) -> Result<DiscoveryDocument, DiscoveryError> {
        let url = discovery_url(domain)?;
        debug!("Discovering instance via {}", url);

        let response = self.transport.get(url).await?;
        if response.status != StatusCode::OK {
            return Err(DiscoveryError::UnexpectedStatus(response.status));
        }

        let document: DiscoveryDocument = serde_json::from_slice(&response.body)
            .map_err(|e| DiscoveryError::Malformed(e.to_string()))?;
        document
            .validate()
            .map_err(|e| DiscoveryError::Malformed(e.to_string()))?;

        if !document.domain.eq_ignore_ascii_case(domain) {
            return Err(DiscoveryError::DomainMismatch {
                expected: domain.to_string(),
                found: document.domain,
            });
        }

        Ok(document)
    }
}

/// Well-known discovery URL for a domain
pub fn discovery_url(domain: &str) -> Result<Url, HttpError> {
    Url::parse(&format!("https://{}{}", domain, DISCOVERY_PATH))
        .map_err(|e| HttpError::InvalidUrl(e.to_string()))
}
