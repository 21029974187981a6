use ahash::AHashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cp_core::types::CandidateId;
use serde_json::Value;
use tokio::sync::oneshot;

/// Side error reported when no listener is registered under the destination.
pub const NO_RECEIVER: &str = "Could not establish connection. Receiving end does not exist.";

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failure of a single send attempt to a single candidate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The host reported an error, either right after dispatch or through
    /// the reply callback.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The reply callback was dropped without ever being invoked.
    #[error("the message port closed before a response was received")]
    PortClosed,

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Outcome handed to a reply callback.
pub type Reply = Result<Value>;

/// One-shot reply callback. Being `FnOnce`, it cannot resolve twice.
pub type ReplyCallback = Box<dyn FnOnce(Reply) + Send + 'static>;

// ---------------------------------------------------------------------------
// Host capability
// ---------------------------------------------------------------------------

/// The host's one-shot messaging primitive.
pub trait RuntimeMessaging: Send + Sync + 'static {
    /// Deliver `message` to `destination` and invoke `reply` at most once
    /// with the response.
    ///
    /// An `Err` return is the host's side-channel error, visible immediately
    /// after dispatch; the callback's outcome is then irrelevant.
    fn send_message(
        &self,
        destination: &CandidateId,
        message: Value,
        reply: ReplyCallback,
    ) -> Result<()>;
}

/// Answers "does this host expose extension messaging at all?".
///
/// Queried synchronously before any probe, and again on every send, so a
/// host whose capability disappears is noticed without a reset.
pub trait HostRuntime: Send + Sync + 'static {
    fn messaging(&self) -> Option<Arc<dyn RuntimeMessaging>>;
}

/// A host whose capability is fixed at construction.
#[derive(Clone)]
pub struct StaticHost {
    runtime: Option<Arc<dyn RuntimeMessaging>>,
}

impl StaticHost {
    pub fn new(runtime: Arc<dyn RuntimeMessaging>) -> Self {
        Self {
            runtime: Some(runtime),
        }
    }

    /// A host without the messaging capability.
    pub fn absent() -> Self {
        Self { runtime: None }
    }
}

impl HostRuntime for StaticHost {
    fn messaging(&self) -> Option<Arc<dyn RuntimeMessaging>> {
        self.runtime.clone()
    }
}

// ---------------------------------------------------------------------------
// request: callback primitive as a timed future
// ---------------------------------------------------------------------------

/// Send one message and wait for its single outcome, bounded by `timeout`.
///
/// Once the timeout fires the attempt is abandoned: a callback that runs
/// later sends into a closed channel and is dropped.
pub async fn request(
    runtime: &dyn RuntimeMessaging,
    destination: &CandidateId,
    message: Value,
    timeout: Duration,
) -> Reply {
    let (tx, rx) = oneshot::channel();
    let callback_target = destination.clone();
    let reply: ReplyCallback = Box::new(move |outcome| {
        if tx.send(outcome).is_err() {
            tracing::debug!(candidate = %callback_target, "late reply ignored");
        }
    });

    runtime.send_message(destination, message, reply)?;

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(TransportError::PortClosed),
        Err(_) => Err(TransportError::Timeout(timeout.as_millis() as u64)),
    }
}

// ---------------------------------------------------------------------------
// InProcessRuntime: for tests and embedding
// ---------------------------------------------------------------------------

/// A message delivered to an in-process companion.
///
/// Exactly one of [`respond`](Self::respond) or [`fail`](Self::fail) may be
/// called; dropping the message without either closes the port.
pub struct IncomingMessage {
    pub destination: CandidateId,
    pub message: Value,
    reply: ReplyCallback,
}

impl IncomingMessage {
    /// The `type` field of the delivered message, if present.
    pub fn message_type(&self) -> Option<&str> {
        self.message.get("type").and_then(Value::as_str)
    }

    pub fn respond(self, response: Value) {
        (self.reply)(Ok(response));
    }

    pub fn fail(self, error: impl Into<String>) {
        (self.reply)(Err(TransportError::Runtime(error.into())));
    }
}

impl std::fmt::Debug for IncomingMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingMessage")
            .field("destination", &self.destination)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// An in-process messaging runtime backed by flume channels.
///
/// Companions register under an id and receive [`IncomingMessage`]s on the
/// returned channel. Sends to unregistered ids fail the way a browser does
/// when no extension with that id is installed.
#[derive(Default)]
pub struct InProcessRuntime {
    companions: Mutex<AHashMap<CandidateId, flume::Sender<IncomingMessage>>>,
    dispatched: Mutex<AHashMap<CandidateId, u64>>,
}

impl InProcessRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a companion under `id`, replacing any previous registration.
    pub fn register(&self, id: impl Into<CandidateId>) -> flume::Receiver<IncomingMessage> {
        let id = id.into();
        let (tx, rx) = flume::unbounded();
        let mut companions = self.companions.lock().unwrap_or_else(|e| e.into_inner());
        companions.insert(id.clone(), tx);
        tracing::debug!(candidate = %id, "companion registered");
        rx
    }

    /// Remove a companion. Returns whether one was registered.
    pub fn unregister(&self, id: &CandidateId) -> bool {
        let mut companions = self.companions.lock().unwrap_or_else(|e| e.into_inner());
        companions.remove(id).is_some()
    }

    /// Number of `send_message` calls addressed to `id`, successful or not.
    pub fn dispatch_count(&self, id: &CandidateId) -> u64 {
        let dispatched = self.dispatched.lock().unwrap_or_else(|e| e.into_inner());
        dispatched.get(id).copied().unwrap_or(0)
    }

    pub fn total_dispatches(&self) -> u64 {
        let dispatched = self.dispatched.lock().unwrap_or_else(|e| e.into_inner());
        dispatched.values().sum()
    }
}

impl RuntimeMessaging for InProcessRuntime {
    fn send_message(
        &self,
        destination: &CandidateId,
        message: Value,
        reply: ReplyCallback,
    ) -> Result<()> {
        {
            let mut dispatched = self.dispatched.lock().unwrap_or_else(|e| e.into_inner());
            *dispatched.entry(destination.clone()).or_insert(0) += 1;
        }

        let sender = {
            let companions = self.companions.lock().unwrap_or_else(|e| e.into_inner());
            companions.get(destination).cloned()
        };

        let Some(sender) = sender else {
            return Err(TransportError::Runtime(NO_RECEIVER.to_string()));
        };

        sender
            .send(IncomingMessage {
                destination: destination.clone(),
                message,
                reply,
            })
            .map_err(|_| TransportError::Runtime(NO_RECEIVER.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> CandidateId {
        CandidateId::from(s)
    }

    #[tokio::test]
    async fn request_returns_companion_response() {
        let runtime = InProcessRuntime::new();
        let rx = runtime.register("ext");
        tokio::spawn(async move {
            let msg = rx.recv_async().await.unwrap();
            assert_eq!(msg.message_type(), Some("ping"));
            msg.respond(json!({"ok": true}));
        });

        let reply = request(
            &runtime,
            &id("ext"),
            json!({"type": "ping"}),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(reply, json!({"ok": true}));
        assert_eq!(runtime.dispatch_count(&id("ext")), 1);
    }

    #[tokio::test]
    async fn unregistered_destination_is_side_channel_error() {
        let runtime = InProcessRuntime::new();
        let err = request(&runtime, &id("missing"), json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Runtime(NO_RECEIVER.to_string()));
        assert_eq!(runtime.dispatch_count(&id("missing")), 1);
    }

    #[tokio::test]
    async fn dropped_message_closes_port() {
        let runtime = InProcessRuntime::new();
        let rx = runtime.register("ext");
        tokio::spawn(async move {
            drop(rx.recv_async().await.unwrap());
        });

        let err = request(&runtime, &id("ext"), json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::PortClosed);
    }

    #[tokio::test]
    async fn failed_reply_is_runtime_error() {
        let runtime = InProcessRuntime::new();
        let rx = runtime.register("ext");
        tokio::spawn(async move {
            rx.recv_async().await.unwrap().fail("extension context invalidated");
        });

        let err = request(&runtime, &id("ext"), json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::Runtime("extension context invalidated".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out_and_late_reply_is_ignored() {
        let runtime = InProcessRuntime::new();
        let rx = runtime.register("ext");

        let err = request(&runtime, &id("ext"), json!({}), Duration::from_millis(250))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Timeout(250));

        // The companion answers after the attempt was abandoned.
        let late = rx.try_recv().expect("message was delivered");
        late.respond(json!({"too": "late"}));
    }

    #[tokio::test]
    async fn unregister_removes_companion() {
        let runtime = InProcessRuntime::new();
        let _rx = runtime.register("ext");
        assert!(runtime.unregister(&id("ext")));
        assert!(!runtime.unregister(&id("ext")));
        let err = request(&runtime, &id("ext"), json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Runtime(_)));
    }

    #[test]
    fn static_host_capability() {
        assert!(StaticHost::absent().messaging().is_none());
        let host = StaticHost::new(Arc::new(InProcessRuntime::new()));
        assert!(host.messaging().is_some());
    }
}
