use cp_core::types::CandidateId;

use crate::transport::TransportError;

/// Errors surfaced to callers of the secure channel.
///
/// Per-candidate failures never appear here on their own; they are logged
/// and turned into "try the next candidate". Only exhaustion, or a channel
/// that could not be brought up at all, reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The host exposes no extension messaging capability.
    #[error("extension messaging is not available in this environment")]
    TransportUnavailable,

    /// No candidate acknowledged the handshake.
    #[error("CodePress extension not available (tried: {})", join_ids(.tried))]
    HandshakeFailed { tried: Vec<CandidateId> },

    /// Every delivery candidate failed; carries the last failure.
    #[error("delivery failed, last attempt to {candidate}: {source}")]
    DeliveryFailed {
        candidate: CandidateId,
        #[source]
        source: TransportError,
    },

    #[error("failed to send message to any extension id")]
    NoCandidateReachable,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The extension answered but refused the request.
    #[error("extension rejected request: {0}")]
    Rejected(String),
}

impl BridgeError {
    /// `true` when the extension could not be reached at all, as opposed to
    /// reached and refusing.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            BridgeError::TransportUnavailable | BridgeError::HandshakeFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

fn join_ids(ids: &[CandidateId]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(CandidateId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_failed_lists_candidates() {
        let err = BridgeError::HandshakeFailed {
            tried: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "CodePress extension not available (tried: a, b)"
        );
        assert!(err.is_unavailable());

        let empty = BridgeError::HandshakeFailed { tried: vec![] };
        assert!(empty.to_string().ends_with("(tried: none)"));
    }

    #[test]
    fn delivery_failed_names_last_candidate_and_reason() {
        let err = BridgeError::DeliveryFailed {
            candidate: "fallback-2".into(),
            source: TransportError::Timeout(5000),
        };
        let text = err.to_string();
        assert!(text.contains("fallback-2"));
        assert!(text.contains("timeout after 5000ms"));
        assert!(!err.is_unavailable());
        assert!(std::error::Error::source(&err).is_some());
    }
}
