//! Identity service capability: resolving a caller credential to a user
//! identity. The core never holds a global handle to this — every
//! operation takes it as an explicit parameter (dependency injection,
//! replacing the source's package-level mutable binding).

use crate::error::Error;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn identify(&self, token: &str) -> Result<Identity, Error>;
}

/// Single-tenant identity client backed by one configured (email, token)
/// pair, for standalone deployments without a separate identity service.
pub struct StandaloneIdentity {
    email: String,
    token: String,
}

impl StandaloneIdentity {
    pub fn new(email: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl IdentityClient for StandaloneIdentity {
    async fn identify(&self, token: &str) -> Result<Identity, Error> {
        if token == self.token {
            Ok(Identity {
                user_id: self.email.clone(),
                email: self.email.clone(),
            })
        } else {
            Err(Error::Auth("invalid standalone token".to_string()))
        }
    }
}

/// Decorator enforcing the configured per-request timeout around any
/// identity client — one link in the logging → metrics → tracing →
/// storage decorator chain the capability traits are designed for.
pub struct TimeoutIdentity<C> {
    inner: C,
    timeout: Duration,
}

impl<C: IdentityClient> TimeoutIdentity<C> {
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<C: IdentityClient> IdentityClient for TimeoutIdentity<C> {
    async fn identify(&self, token: &str) -> Result<Identity, Error> {
        match tokio::time::timeout(self.timeout, self.inner.identify(token)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Transient("identity service timed out".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn standalone_identity_accepts_configured_token() {
        let identity = StandaloneIdentity::new("a@example.com", "secret");
        let resolved = identity.identify("secret").await.unwrap();
        assert_eq!(resolved.email, "a@example.com");
    }

    #[tokio::test]
    async fn standalone_identity_rejects_wrong_token() {
        let identity = StandaloneIdentity::new("a@example.com", "secret");
        let err = identity.identify("wrong").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Auth);
    }

    struct SlowIdentity;

    #[async_trait]
    impl IdentityClient for SlowIdentity {
        async fn identify(&self, _token: &str) -> Result<Identity, Error> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Identity {
                user_id: "late".to_string(),
                email: "late@example.com".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn timeout_identity_surfaces_transient_on_timeout() {
        let identity = TimeoutIdentity::new(SlowIdentity, Duration::from_millis(5));
        let err = identity.identify("token").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transient);
    }
}
