//! Keeps locally stored credentials in step with the companion extension.
//!
//! Local storage always wins: a token is stored before the extension is
//! contacted, and nothing the extension does (or fails to do) can make a
//! store or clear fail. Extension sync is best effort and reported as a
//! `bool`.

use std::sync::Arc;

use cp_core::types::User;

use crate::channel::SecureChannel;
use crate::credential_store::CredentialStore;
use crate::messages;
use crate::page_bus::{PageBus, PageMessage};
use crate::protocol::AuthPayload;

pub struct AuthSync {
    channel: Arc<SecureChannel>,
    store: CredentialStore,
    page: PageBus,
}

impl AuthSync {
    pub fn new(channel: Arc<SecureChannel>, store: CredentialStore, page: PageBus) -> Self {
        Self {
            channel,
            store,
            page,
        }
    }

    pub fn channel(&self) -> &Arc<SecureChannel> {
        &self.channel
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn page(&self) -> &PageBus {
        &self.page
    }

    /// Store `token` locally, then try to seed it into the extension.
    ///
    /// Returns `true` only if the extension acknowledged the token.
    pub async fn store_and_sync(&self, token: &str) -> bool {
        self.store.set_token(token).await;

        if !self.channel.initialize().await {
            tracing::info!("CodePress extension not available, token stored locally only");
            return false;
        }

        match messages::seed_credential(&self.channel, token).await {
            Ok(_) => {
                tracing::info!(
                    extension_id = %self.channel.extension_id(),
                    "token synced with CodePress extension"
                );
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to sync token with CodePress extension");
                false
            }
        }
    }

    /// Record a completed login: store the user and token, sync the token,
    /// and announce the new state on the page.
    pub async fn sign_in(&self, token: &str, user: User) -> bool {
        tracing::info!(user = %user.display_name(), "signed in");
        self.store.set_user(user).await;
        let synced = self.store_and_sync(token).await;
        self.publish_auth_state().await;
        synced
    }

    /// Log out locally and tell both the page and, if it is already known to
    /// be reachable, the extension.
    pub async fn clear(&self) {
        self.store.clear_all().await;
        self.publish_auth_state().await;

        if !self.channel.is_available() {
            tracing::debug!("CodePress extension not available for logout sync");
            return;
        }

        match messages::broadcast_auth_state(&self.channel, AuthPayload::logged_out()).await {
            Ok(_) => tracing::info!("authentication cleared from CodePress extension"),
            Err(e) => tracing::warn!(error = %e, "failed to clear CodePress extension auth"),
        }
    }

    /// Post the current auth state to in-page listeners. Returns the number
    /// of listeners reached.
    pub async fn publish_auth_state(&self) -> usize {
        let payload = self.store.auth_payload().await;
        match PageMessage::auth_update(&payload) {
            Ok(msg) => self.page.publish(msg),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode auth update for the page");
                0
            }
        }
    }
}
