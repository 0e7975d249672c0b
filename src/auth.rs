//! Shared-secret gate for mutating requests.
//!
//! Writes must carry the configured secret in the `x-admin-secret` header.
//! When no secret is configured every request passes: deployments without
//! `ADMIN_PASSWORD` set accept anonymous writes. Reads never consult the gate.

use axum::http::HeaderMap;

use crate::error::StoreError;

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    secret: Option<String>,
}

impl AuthGate {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// A gate that lets everything through.
    pub fn disabled() -> Self {
        Self { secret: None }
    }

    pub fn is_enforced(&self) -> bool {
        self.secret.is_some()
    }

    pub fn is_authorized(&self, headers: &HeaderMap) -> bool {
        match &self.secret {
            None => true,
            Some(secret) => headers
                .get(ADMIN_SECRET_HEADER)
                .map(|v| v.as_bytes() == secret.as_bytes())
                .unwrap_or(false),
        }
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<(), StoreError> {
        if self.is_authorized(headers) {
            Ok(())
        } else {
            Err(StoreError::Unauthorized)
        }
    }
}
