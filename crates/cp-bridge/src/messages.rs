//! Typed requests built on top of [`SecureChannel::send_secure`].
//!
//! These only shape payloads and interpret answers; discovery, fallback and
//! timeouts all live in the channel.

use serde_json::Value;

use crate::channel::SecureChannel;
use crate::error::{BridgeError, Result};
use crate::protocol::{AckResponse, AuthPayload, ExtensionMessage, ExtensionResponse};

const SEED_REJECTED: &str = "extension rejected token sync";

/// Hand the bearer token to the extension.
///
/// Succeeds when the answer is an object with a truthy `success` field,
/// whatever else it carries. Any other answer is [`BridgeError::Rejected`]
/// carrying the extension's error text when it gave one.
pub async fn seed_credential(channel: &SecureChannel, token: &str) -> Result<AckResponse> {
    let raw = channel
        .send_raw(ExtensionMessage::Seed {
            token: token.to_string(),
        })
        .await?;

    let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
    let accepted = raw.get("success").is_some_and(is_truthy);
    if accepted {
        Ok(AckResponse {
            success: true,
            message: text("message"),
            error: None,
        })
    } else {
        Err(BridgeError::Rejected(
            text("error").unwrap_or_else(|| SEED_REJECTED.to_string()),
        ))
    }
}

/// Loose truthiness as the extension's JavaScript side sees it.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Tell the extension about the current logged-in state.
pub async fn broadcast_auth_state(
    channel: &SecureChannel,
    payload: AuthPayload,
) -> Result<ExtensionResponse> {
    channel
        .send_secure(ExtensionMessage::AuthUpdate { payload })
        .await
}

/// Ask the extension to open (or focus) the web app.
pub async fn open_web_app(channel: &SecureChannel) -> Result<ExtensionResponse> {
    channel.send_secure(ExtensionMessage::OpenWebApp).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_follows_javascript() {
        for v in [json!(true), json!(1), json!(-0.5), json!("yes"), json!({}), json!([])] {
            assert!(is_truthy(&v), "{v} should be truthy");
        }
        for v in [json!(false), json!(0), json!(""), Value::Null] {
            assert!(!is_truthy(&v), "{v} should be falsy");
        }
    }
}
