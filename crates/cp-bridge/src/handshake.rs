//! Ping/pong handshake used to tell the real companion apart from ids that
//! are stale, belong to another extension, or are not installed.

use cp_core::types::CandidateId;
use serde_json::Value;

use crate::channel::ChannelSettings;
use crate::metrics::ChannelMetrics;
use crate::protocol::{ExtensionMessage, HandshakeAck, SecureEnvelope};
use crate::transport::{self, RuntimeMessaging, TransportError};

/// Why a single candidate failed its probe.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbeFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected handshake acknowledgment: {0}")]
    UnexpectedAck(Value),
}

/// Send one ping to `candidate` and check the acknowledgment.
pub async fn probe(
    runtime: &dyn RuntimeMessaging,
    candidate: &CandidateId,
    settings: &ChannelSettings,
) -> Result<(), ProbeFailure> {
    let envelope =
        SecureEnvelope::seal(ExtensionMessage::Ping, &settings.auth_key, &settings.origin);
    let message = envelope
        .to_value()
        .map_err(|e| TransportError::Serialization(e.to_string()))?;

    let raw = transport::request(runtime, candidate, message, settings.probe_timeout).await?;
    if HandshakeAck::validates(&raw, &settings.extension_name) {
        Ok(())
    } else {
        Err(ProbeFailure::UnexpectedAck(raw))
    }
}

/// Probe `candidates` strictly in order and return the first that
/// acknowledges. On failure, returns every candidate that was tried.
///
/// The winner is the first valid candidate in registry order, not the
/// fastest responder.
pub async fn discover(
    runtime: &dyn RuntimeMessaging,
    candidates: &[CandidateId],
    settings: &ChannelSettings,
    metrics: &ChannelMetrics,
) -> Result<CandidateId, Vec<CandidateId>> {
    let mut tried = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        tracing::debug!(candidate = %candidate, "probing extension id");
        metrics.probe_sent();
        match probe(runtime, candidate, settings).await {
            Ok(()) => {
                tracing::info!(candidate = %candidate, "CodePress extension detected and verified");
                return Ok(candidate.clone());
            }
            Err(failure) => {
                tracing::debug!(candidate = %candidate, error = %failure, "probe failed");
                metrics.probe_failed(&failure.to_string());
                tried.push(candidate.clone());
            }
        }
    }

    Err(tried)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
