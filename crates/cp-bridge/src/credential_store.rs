//! Local storage for the bearer token and the cached user record.
//!
//! The token is wrapped in [`Zeroizing`] so its bytes are wiped when it is
//! replaced, cleared or dropped, and it never appears in `Debug` output.

use std::sync::Arc;

use cp_core::types::User;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

use crate::protocol::AuthPayload;

/// Cloneable handle; clones share the same storage.
#[derive(Clone, Default)]
pub struct CredentialStore {
    token: Arc<RwLock<Option<Zeroizing<String>>>>,
    user: Arc<RwLock<Option<User>>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_token(&self, token: &str) {
        *self.token.write().await = Some(Zeroizing::new(token.to_string()));
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.as_ref().map(|t| t.as_str().to_owned())
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    pub async fn set_user(&self, user: User) {
        *self.user.write().await = Some(user);
    }

    pub async fn user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    pub async fn clear_user(&self) {
        *self.user.write().await = None;
    }

    pub async fn clear_all(&self) {
        self.clear_token().await;
        self.clear_user().await;
    }

    /// Snapshot of the stored state. Logged in means both a token and a
    /// user are present.
    pub async fn auth_payload(&self) -> AuthPayload {
        let token = self.token().await;
        let user = self.user().await;
        let is_logged_in = token.is_some() && user.is_some();
        AuthPayload {
            token,
            user,
            is_logged_in,
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let has_token = self.token.try_read().map(|t| t.is_some()).ok();
        f.debug_struct("CredentialStore")
            .field("has_token", &has_token)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
