use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::protocol::AuthPayload;

/// Value of `source` on every message the web app posts to the page.
pub const PAGE_SOURCE: &str = "codepress-web-app";

/// A message posted to in-page listeners such as the extension's content
/// script. Unlike the secure channel, this path needs no handshake and
/// gets no reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    pub source: String,
}

impl PageMessage {
    pub fn auth_update(payload: &AuthPayload) -> serde_json::Result<Self> {
        Ok(Self {
            kind: "CODEPRESS_AUTH_UPDATE".to_string(),
            payload: serde_json::to_value(payload)?,
            source: PAGE_SOURCE.to_string(),
        })
    }
}

/// A broadcast-style bus built on top of flume channels.
///
/// Each call to [`subscribe`](Self::subscribe) creates a receiver that gets
/// every message published afterwards. Clones share the same subscribers.
#[derive(Clone, Default)]
pub struct PageBus {
    inner: Arc<Mutex<Vec<flume::Sender<PageMessage>>>>,
}

impl PageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> flume::Receiver<PageMessage> {
        let (tx, rx) = flume::unbounded();
        let mut senders = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        senders.push(tx);
        rx
    }

    /// Publish to all current subscribers, pruning those whose receivers
    /// have been dropped. Returns how many received the message.
    pub fn publish(&self, msg: PageMessage) -> usize {
        let mut senders = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|tx| tx.send(msg.clone()).is_ok());
        senders.len()
    }

    pub fn subscriber_count(&self) -> usize {
        let senders = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        senders.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
