//! Secure messaging bridge between the CodePress web app and its companion
//! browser extension.
//!
//! The extension's id is not known for certain ahead of time, so the bridge
//! probes a list of candidates with a ping/pong handshake, remembers the
//! first one that answers correctly, and then delivers enveloped messages
//! cache-first with fallback to the remaining candidates.
//!
//! Key modules:
//! - [`transport`]: host runtime capability and the one-shot send primitive
//! - [`registry`]: ordered, deduplicated candidate ids
//! - [`handshake`]: ping probes and acknowledgment checking
//! - [`channel`]: discovery state machine and fallback delivery
//! - [`messages`]: seed / auth-update / open-web-app builders
//! - [`auth_sync`]: local credential storage kept in step with the extension
//! - [`page_bus`]: in-page broadcast for content scripts

pub mod auth_sync;
pub mod channel;
pub mod credential_store;
pub mod error;
pub mod handshake;
pub mod messages;
pub mod metrics;
pub mod page_bus;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use channel::{ChannelSettings, ChannelState, SecureChannel};
pub use error::BridgeError;
pub use registry::EndpointRegistry;
