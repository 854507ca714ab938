/// Handle parsing
///
/// Accepted forms: `username`, `@username`, `username@domain`, `@username@domain`.
use crate::error::{ServerError, ServerResult};
use serde::Serialize;

/// Maximum username length in characters
pub const MAX_USERNAME_LEN: usize = 32;

/// A parsed handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handle {
    pub username: String,
    pub domain: Option<String>,
}

impl Handle {
    /// Split raw handle text into username and optional domain
    ///
    /// Strips at most one leading `@`, then splits on the first remaining `@`.
    /// Never fails; the username may come back empty.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let body = trimmed.strip_prefix('@').unwrap_or(trimmed);

        match body.split_once('@') {
            Some((username, domain)) => Self {
                username: username.to_string(),
                domain: Some(domain.to_string()),
            },
            None => Self {
                username: body.to_string(),
                domain: None,
            },
        }
    }
}

/// Check the username segment of a handle
pub fn validate_username(username: &str) -> ServerResult<()> {
    if username.is_empty() {
        return Err(ServerError::InvalidHandle("Username cannot be empty".to_string()));
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ServerError::InvalidHandle(format!(
            "Username too long (max {} characters)",
            MAX_USERNAME_LEN
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ServerError::InvalidHandle(
            "Username contains invalid characters".to_string(),
        ));
    }

    Ok(())
}
