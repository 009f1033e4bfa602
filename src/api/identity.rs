//! Request authentication.

use std::collections::HashMap;

use crate::records::OwnerId;
use crate::storage::config::IdentitySettings;

use super::ApiError;

/// Credentials carried by one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRequest {
    pub bearer: Option<String>,
}

impl AuthRequest {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Resolves a request to the owner it acts for.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, request: &AuthRequest) -> Result<OwnerId, ApiError>;
}

/// Fixed bearer-token table, loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenIdentity {
    tokens: HashMap<String, OwnerId>,
}

impl StaticTokenIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, owner: OwnerId) -> Self {
        self.tokens.insert(token.into(), owner);
        self
    }

    /// Build from settings; entries with a blank owner are skipped.
    pub fn from_settings(settings: &IdentitySettings) -> Self {
        let mut tokens = HashMap::new();
        for (token, owner) in &settings.tokens {
            match OwnerId::new(owner.as_str()) {
                Ok(owner) => {
                    tokens.insert(token.clone(), owner);
                }
                Err(e) => tracing::warn!("Skipping identity token: {}", e),
            }
        }
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityProvider for StaticTokenIdentity {
    fn authenticate(&self, request: &AuthRequest) -> Result<OwnerId, ApiError> {
        let token = request
            .bearer
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("unknown token".to_string()))
    }
}
