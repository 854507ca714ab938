/// Remote domain validation
///
/// Guards every outbound federation request against server-side request
/// forgery. Syntax and reserved-name checks run here; resolved addresses are
/// checked by [`is_public_ip`] inside the HTTP client's DNS resolver.
use crate::error::ServerError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// Maximum length of a DNS name
pub const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single DNS label
const MAX_LABEL_LEN: usize = 63;

/// Names that always point back into the local network
const RESERVED_SUFFIXES: &[&str] = &[
    "localhost",
    "local",
    "localdomain",
    "internal",
    "home.arpa",
    "arpa",
];

/// Why a domain was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("domain is empty")]
    Empty,

    #[error("domain exceeds 253 characters")]
    TooLong,

    #[error("IP address literals are not accepted ({0})")]
    IpLiteral(&'static str),

    #[error("invalid DNS label: {0:?}")]
    InvalidLabel(String),

    #[error("domain must contain at least two labels")]
    SingleLabel,

    #[error("top-level label cannot be numeric")]
    NumericTld,

    #[error("reserved domain: {0}")]
    Reserved(String),

    #[error("domain is blocked by operator policy: {0}")]
    Blocked(String),
}

impl From<DomainError> for ServerError {
    fn from(e: DomainError) -> Self {
        ServerError::InvalidDomain(e.to_string())
    }
}

/// Domain validator
#[derive(Debug, Clone, Default)]
pub struct DomainValidator {
    /// Operator deny-list, matched as suffixes
    blocked: Vec<String>,
}

impl DomainValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add operator-blocked domains
    pub fn with_blocked(mut self, blocked: Vec<String>) -> Self {
        self.blocked = blocked
            .into_iter()
            .map(|d| normalize(&d))
            .filter(|d| !d.is_empty())
            .collect();
        self
    }

    /// Validate a domain, returning its normalized form
    pub fn validate(&self, raw: &str) -> Result<String, DomainError> {
        let domain = normalize(raw);

        if domain.is_empty() {
            return Err(DomainError::Empty);
        }

        if domain.len() > MAX_DOMAIN_LEN {
            return Err(DomainError::TooLong);
        }

        let unbracketed = domain
            .strip_prefix('[')
            .and_then(|d| d.strip_suffix(']'))
            .unwrap_or(&domain);
        if let Ok(ip) = unbracketed.parse::<IpAddr>() {
            return Err(DomainError::IpLiteral(classify_ip(ip)));
        }

        let labels: Vec<&str> = domain.split('.').collect();
        for label in &labels {
            if !is_valid_label(label) {
                return Err(DomainError::InvalidLabel(label.to_string()));
            }
        }

        if labels.len() < 2 {
            return Err(DomainError::SingleLabel);
        }

        if labels
            .last()
            .is_some_and(|tld| tld.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(DomainError::NumericTld);
        }

        if let Some(suffix) = RESERVED_SUFFIXES
            .iter()
            .find(|suffix| matches_suffix(&domain, suffix))
        {
            return Err(DomainError::Reserved(suffix.to_string()));
        }

        if let Some(blocked) = self.blocked.iter().find(|b| matches_suffix(&domain, b)) {
            return Err(DomainError::Blocked(blocked.clone()));
        }

        Ok(domain)
    }
}

/// Trim, lowercase and drop one trailing dot
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_suffix('.')
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

fn matches_suffix(domain: &str, suffix: &str) -> bool {
    domain == suffix
        || domain
            .strip_suffix(suffix)
            .is_some_and(|rest| rest.ends_with('.'))
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Whether an address is routable on the public internet
pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_ipv4(v4),
        IpAddr::V6(v6) => is_public_ipv6(v6),
    }
}

fn is_public_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();

    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || ip.is_documentation()
        || a == 0
        // shared address space 100.64.0.0/10
        || (a == 100 && (b & 0xc0) == 64)
        // IETF protocol assignments 192.0.0.0/24
        || (a == 192 && b == 0 && c == 0)
        // benchmarking 198.18.0.0/15
        || (a == 198 && (b & 0xfe) == 18)
        // reserved 240.0.0.0/4
        || a >= 240)
}

fn is_public_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_public_ipv4(v4);
    }

    let first = ip.segments()[0];

    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // unique local fc00::/7
        || (first & 0xfe00) == 0xfc00
        // link-local fe80::/10
        || (first & 0xffc0) == 0xfe80
        // documentation 2001:db8::/32
        || (first == 0x2001 && ip.segments()[1] == 0x0db8))
}

fn classify_ip(ip: IpAddr) -> &'static str {
    let loopback = ip.is_loopback();
    let multicast = ip.is_multicast();
    let (private, link_local) = match ip {
        IpAddr::V4(v4) => (v4.is_private(), v4.is_link_local()),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            ((first & 0xfe00) == 0xfc00, (first & 0xffc0) == 0xfe80)
        }
    };

    if loopback {
        "loopback"
    } else if private {
        "private"
    } else if link_local {
        "link-local"
    } else if multicast {
        "multicast"
    } else if !is_public_ip(ip) {
        "reserved"
    } else {
        "public"
    }
}
