//! User identity (C16), external per the system's scope: this crate treats
//! a caller's identity as an opaque string `UserId` plus a pluggable
//! [`TokenVerifier`], never as a concrete auth provider. REST and
//! WebSocket transport both resolve a bearer token through the same trait
//! object before calling into the [`crate::table::TableManager`].

use async_trait::async_trait;

use crate::error::{AppError, Result};

/// An authenticated caller, as resolved from a bearer token. Everything
/// downstream of this point treats `user_id` as an opaque string — the
/// real identity provider lives outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Verifies a bearer token and resolves the caller it names.
///
/// Swap the `standalone` profile's [`StaticTokenVerifier`] for whatever the
/// deployment's real identity provider needs (JWT validation against a
/// JWKS endpoint, a session-store lookup, ...); the rest of the crate only
/// ever sees an [`AuthenticatedUser`].
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser>;
}

/// Treats the bearer token itself as the user id. This is what the
/// `standalone` profile wires up by default: it is enough to exercise
/// every seat/ownership rule in the table aggregate without depending on a
/// real identity provider, but it is not a credential check and must never
/// be reached in `production`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticTokenVerifier;

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser> {
        if token.trim().is_empty() {
            return Err(AppError::Auth("missing bearer token".to_string()));
        }
        Ok(AuthenticatedUser { user_id: token.to_string() })
    }
}
