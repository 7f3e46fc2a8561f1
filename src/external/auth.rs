//! Identity collaborator interface.
//!
//! Authentication happens upstream; the gateway only receives an
//! already-validated identity with its credential reference and expiry.
//! [`Authenticator`] is the seam where a production deployment plugs its
//! token validation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::MemberId;
use crate::error::GatewayError;

/// The validated identity attached to a connection.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Logical identity (one per user, shared across devices).
    pub identity: MemberId,
    /// Opaque reference to the credential that authenticated this
    /// connection; sessions sharing it belong to the same login.
    pub credential_ref: String,
    /// When the credential expires.
    pub expiry_time: DateTime<Utc>,
}

/// Validates handshake tokens into an [`AuthContext`].
#[async_trait]
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    /// Validates a handshake token.
    ///
    /// # Errors
    ///
    /// Returns a forbidden-class [`GatewayError`] on invalid or expired
    /// tokens.
    async fn authenticate(&self, identity: &str, token: &str) -> Result<AuthContext, GatewayError>;
}

/// Development authenticator: trusts the handshake parameters as-is.
///
/// The identity is taken verbatim and the token doubles as the
/// credential reference. Sessions get a fixed validity window.
#[derive(Debug, Clone)]
pub struct HandshakeAuthenticator {
    /// Credential validity granted to accepted handshakes.
    pub validity: Duration,
}

impl Default for HandshakeAuthenticator {
    fn default() -> Self {
        Self {
            validity: Duration::hours(1),
        }
    }
}

#[async_trait]
impl Authenticator for HandshakeAuthenticator {
    async fn authenticate(&self, identity: &str, token: &str) -> Result<AuthContext, GatewayError> {
        if identity.is_empty() {
            return Err(GatewayError::Validation("identity is empty".to_string()));
        }
        if token.is_empty() {
            return Err(GatewayError::Validation(
                "credential token is empty".to_string(),
            ));
        }
        Ok(AuthContext {
            identity: MemberId::from(identity),
            credential_ref: token.to_string(),
            expiry_time: Utc::now() + self.validity,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handshake_authenticator_accepts_non_empty() {
        let auth = HandshakeAuthenticator::default();
        let ctx = auth.authenticate("alice@example.com", "tok-1").await;
        let Ok(ctx) = ctx else {
            panic!("expected success");
        };
        assert_eq!(ctx.identity.as_str(), "alice@example.com");
        assert_eq!(ctx.credential_ref, "tok-1");
        assert!(ctx.expiry_time > Utc::now());
    }

    #[tokio::test]
    async fn handshake_authenticator_rejects_empty() {
        let auth = HandshakeAuthenticator::default();
        assert!(auth.authenticate("", "tok").await.is_err());
        assert!(auth.authenticate("alice", "").await.is_err());
    }
}
