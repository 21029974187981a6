//! Discovery state machine and cache-first delivery to the companion
//! extension.
//!
//! ```text
//! Uninitialized --initialize(), no transport---> Unavailable
//! Uninitialized --initialize()-----------------> Validating
//! Validating    --a probe succeeds-------------> Validated(id)
//! Validating    --every probe fails------------> Unavailable
//! Validated(id) --reset()----------------------> Uninitialized
//! Unavailable   --reset()----------------------> Uninitialized
//! ```
//!
//! While `Validating`, the in-flight probe sequence is stored in the state
//! itself as a shared future, so every concurrent `initialize()` awaits the
//! same sequence.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cp_core::config::ExtensionConfig;
use cp_core::types::CandidateId;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;

use crate::error::{BridgeError, Result};
use crate::handshake;
use crate::metrics::{ChannelMetrics, ChannelMetricsSnapshot};
use crate::protocol::{ExtensionMessage, ExtensionResponse, SecureEnvelope};
use crate::registry::EndpointRegistry;
use crate::transport::{self, HostRuntime, RuntimeMessaging};

// ---------------------------------------------------------------------------
// ChannelSettings
// ---------------------------------------------------------------------------

/// Constants consumed by the channel.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub auth_key: String,
    pub extension_name: String,
    pub origin: String,
    /// Reported by [`SecureChannel::extension_id`] until a candidate is validated.
    pub default_extension_id: CandidateId,
    pub probe_timeout: Duration,
    pub message_timeout: Duration,
}

impl ChannelSettings {
    pub fn from_config(config: &ExtensionConfig) -> Self {
        Self {
            auth_key: config.auth_key.clone(),
            extension_name: config.extension_name.clone(),
            origin: config.origin.clone(),
            default_extension_id: CandidateId::from(config.default_extension_id.as_str()),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
            message_timeout: Duration::from_millis(config.message_timeout_ms),
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self::from_config(&ExtensionConfig::default())
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Observable discovery state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Uninitialized,
    Validating,
    Validated(CandidateId),
    Unavailable,
}

#[derive(Debug, Clone)]
enum Unavailable {
    NoTransport,
    HandshakeFailed(Vec<CandidateId>),
}

impl Unavailable {
    fn into_error(self) -> BridgeError {
        match self {
            Unavailable::NoTransport => BridgeError::TransportUnavailable,
            Unavailable::HandshakeFailed(tried) => BridgeError::HandshakeFailed { tried },
        }
    }
}

type Discovery = Shared<BoxFuture<'static, std::result::Result<CandidateId, Unavailable>>>;

enum Phase {
    Uninitialized,
    Validating(Discovery),
    Validated(CandidateId),
    Unavailable(Unavailable),
}

struct Inner {
    phase: Phase,
    /// Bumped by `reset()`. A probe sequence only settles the state if the
    /// epoch it started in is still current.
    epoch: u64,
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|e| {
        tracing::warn!("channel state lock was poisoned, recovering");
        e.into_inner()
    })
}

// ---------------------------------------------------------------------------
// SecureChannel
// ---------------------------------------------------------------------------

/// Discovers the companion extension and delivers enveloped messages to it.
///
/// Each instance owns its own state; construct one per page/session and
/// share it behind an `Arc`.
pub struct SecureChannel {
    host: Arc<dyn HostRuntime>,
    registry: EndpointRegistry,
    settings: Arc<ChannelSettings>,
    inner: Arc<Mutex<Inner>>,
    metrics: Arc<ChannelMetrics>,
}

impl SecureChannel {
    pub fn new(
        host: Arc<dyn HostRuntime>,
        registry: EndpointRegistry,
        settings: ChannelSettings,
    ) -> Self {
        Self {
            host,
            registry,
            settings: Arc::new(settings),
            inner: Arc::new(Mutex::new(Inner {
                phase: Phase::Uninitialized,
                epoch: 0,
            })),
            metrics: Arc::new(ChannelMetrics::new()),
        }
    }

    pub fn from_config(host: Arc<dyn HostRuntime>, config: &ExtensionConfig) -> Self {
        Self::new(
            host,
            EndpointRegistry::from_config(config),
            ChannelSettings::from_config(config),
        )
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    /// Bring the channel up. Returns whether a candidate was validated.
    ///
    /// Memoized: once validated or unavailable, later calls return at once
    /// without probing until [`reset`](Self::reset).
    pub async fn initialize(&self) -> bool {
        self.discover().await.is_ok()
    }

    /// Send `message` to the extension, cache-first with fallback.
    ///
    /// Candidates are tried one at a time: the cached id first, then the rest
    /// of the registry. The first candidate to return any response wins and
    /// becomes the cached id.
    pub async fn send_secure(&self, message: ExtensionMessage) -> Result<ExtensionResponse> {
        self.send_raw(message).await.map(ExtensionResponse::from_value)
    }

    /// [`send_secure`](Self::send_secure) without interpreting the answer.
    pub async fn send_raw(&self, message: ExtensionMessage) -> Result<Value> {
        let cached = self.discover().await.map_err(Unavailable::into_error)?;
        let runtime = self
            .host
            .messaging()
            .ok_or(BridgeError::TransportUnavailable)?;

        let envelope =
            SecureEnvelope::seal(message, &self.settings.auth_key, &self.settings.origin);
        let kind = envelope.message.kind();
        let payload = envelope.to_value()?;

        let mut last_failure = None;
        for candidate in self.registry.delivery_order(Some(&cached)) {
            tracing::debug!(candidate = %candidate, kind, "sending message to extension");
            match transport::request(
                &*runtime,
                &candidate,
                payload.clone(),
                self.settings.message_timeout,
            )
            .await
            {
                Ok(raw) => {
                    let failover = candidate != cached;
                    if failover {
                        tracing::info!(
                            previous = %cached,
                            candidate = %candidate,
                            "extension answered on a different id, updating cache"
                        );
                    }
                    self.remember(&candidate);
                    self.metrics.delivered(failover);
                    return Ok(raw);
                }
                Err(e) => {
                    tracing::warn!(
                        candidate = %candidate,
                        kind,
                        error = %e,
                        "delivery attempt failed"
                    );
                    self.metrics.attempt_failed(&e.to_string());
                    last_failure = Some((candidate, e));
                }
            }
        }

        self.metrics.exhausted();
        let err = match last_failure {
            Some((candidate, source)) => BridgeError::DeliveryFailed { candidate, source },
            None => BridgeError::NoCandidateReachable,
        };
        tracing::error!(kind, error = %err, "failed to deliver message to any extension id");
        Err(err)
    }

    /// Forget everything and return to `Uninitialized`. No messages are sent.
    ///
    /// A probe sequence still in flight keeps running for whoever awaits it,
    /// but its result no longer touches this channel's state.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.phase = Phase::Uninitialized;
        tracing::debug!(epoch = inner.epoch, "extension channel reset");
    }

    pub fn state(&self) -> ChannelState {
        match &self.lock().phase {
            Phase::Uninitialized => ChannelState::Uninitialized,
            Phase::Validating(_) => ChannelState::Validating,
            Phase::Validated(id) => ChannelState::Validated(id.clone()),
            Phase::Unavailable(_) => ChannelState::Unavailable,
        }
    }

    /// `true` only once a candidate has been validated.
    pub fn is_available(&self) -> bool {
        matches!(self.lock().phase, Phase::Validated(_))
    }

    pub fn validated_id(&self) -> Option<CandidateId> {
        match &self.lock().phase {
            Phase::Validated(id) => Some(id.clone()),
            _ => None,
        }
    }

    /// The validated id, or the configured default while there is none.
    pub fn extension_id(&self) -> CandidateId {
        self.validated_id()
            .unwrap_or_else(|| self.settings.default_extension_id.clone())
    }

    pub fn metrics(&self) -> ChannelMetricsSnapshot {
        self.metrics.snapshot()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    async fn discover(&self) -> std::result::Result<CandidateId, Unavailable> {
        let pending = {
            let mut inner = self.lock();
            match &inner.phase {
                Phase::Validated(id) => return Ok(id.clone()),
                Phase::Unavailable(reason) => return Err(reason.clone()),
                Phase::Validating(pending) => pending.clone(),
                Phase::Uninitialized => {
                    let Some(runtime) = self.host.messaging() else {
                        tracing::warn!("extension messaging not available in this host");
                        inner.phase = Phase::Unavailable(Unavailable::NoTransport);
                        return Err(Unavailable::NoTransport);
                    };
                    let pending = self.start_discovery(runtime, inner.epoch);
                    inner.phase = Phase::Validating(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn start_discovery(&self, runtime: Arc<dyn RuntimeMessaging>, epoch: u64) -> Discovery {
        let candidates = self.registry.candidates().to_vec();
        let settings = Arc::clone(&self.settings);
        let metrics = Arc::clone(&self.metrics);
        let inner = Arc::clone(&self.inner);

        tracing::debug!(candidates = candidates.len(), epoch, "starting extension discovery");

        async move {
            let outcome = handshake::discover(&*runtime, &candidates, &settings, &metrics)
                .await
                .map_err(Unavailable::HandshakeFailed);

            if let Err(Unavailable::HandshakeFailed(tried)) = &outcome {
                let tried: Vec<&str> = tried.iter().map(CandidateId::as_str).collect();
                tracing::error!(tried = ?tried, "CodePress extension not responding");
            }

            let mut state = lock_inner(&inner);
            if state.epoch == epoch {
                state.phase = match &outcome {
                    Ok(id) => Phase::Validated(id.clone()),
                    Err(reason) => Phase::Unavailable(reason.clone()),
                };
            } else {
                tracing::debug!(
                    epoch,
                    current = state.epoch,
                    "discovery outlived a reset, discarding"
                );
            }
            drop(state);

            outcome
        }
        .boxed()
        .shared()
    }

    fn remember(&self, candidate: &CandidateId) {
        let mut inner = self.lock();
        if let Phase::Validated(current) = &mut inner.phase {
            if current != candidate {
                *current = candidate.clone();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
