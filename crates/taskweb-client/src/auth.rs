//! Resolving the signed-in user at startup.

use async_trait::async_trait;
use taskweb_types::UserId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("sign-in failed: {0}")]
    SignInFailed(String),
}

/// Source of the current user's identity.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_user(&self) -> Result<UserId, AuthError>;
}

/// A fixed, already-known user.
#[derive(Clone, Copy, Debug)]
pub struct StaticAuth(pub UserId);

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_user(&self) -> Result<UserId, AuthError> {
        Ok(self.0)
    }
}

/// Anonymous sign-in: a fresh identity per provider, stable for its lifetime.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnonymousAuth {
    user: UserId,
}

impl AnonymousAuth {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthProvider for AnonymousAuth {
    async fn current_user(&self) -> Result<UserId, AuthError> {
        Ok(self.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_anonymous_identity_is_stable() {
        let auth = AnonymousAuth::new();
        assert_eq!(auth.current_user().await, auth.current_user().await);
        assert_ne!(auth.current_user().await, AnonymousAuth::new().current_user().await);
    }
}
