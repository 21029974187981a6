use cp_core::types::User;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Outgoing messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtensionMessage {
    /// Handshake probe.
    #[serde(rename = "ping")]
    Ping,
    /// Hands the bearer token to the extension.
    #[serde(rename = "seed")]
    Seed { token: String },
    #[serde(rename = "CODEPRESS_AUTH_UPDATE")]
    AuthUpdate { payload: AuthPayload },
    #[serde(rename = "OPEN_WEB_APP")]
    OpenWebApp,
}

impl ExtensionMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtensionMessage::Ping => "ping",
            ExtensionMessage::Seed { .. } => "seed",
            ExtensionMessage::AuthUpdate { .. } => "CODEPRESS_AUTH_UPDATE",
            ExtensionMessage::OpenWebApp => "OPEN_WEB_APP",
        }
    }
}

/// Current logged-in state as shared with the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: Option<String>,
    pub user: Option<User>,
    #[serde(rename = "isLoggedIn")]
    pub is_logged_in: bool,
}

impl AuthPayload {
    pub fn logged_out() -> Self {
        Self {
            token: None,
            user: None,
            is_logged_in: false,
        }
    }
}

/// A message plus the fields every outgoing message carries.
///
/// `auth` is a static tag shared with the extension, not a proof of
/// anything: it is compiled into the client and readable by any page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecureEnvelope {
    #[serde(flatten)]
    pub message: ExtensionMessage,
    pub auth: String,
    /// Milliseconds since the Unix epoch. Advisory only.
    pub timestamp: i64,
    pub origin: String,
}

impl SecureEnvelope {
    /// Wrap `message`, stamping it with the current time.
    pub fn seal(message: ExtensionMessage, auth: &str, origin: &str) -> Self {
        Self {
            message,
            auth: auth.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            origin: origin.to_string(),
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Acknowledgment to a handshake probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeAck {
    pub pong: bool,
    #[serde(rename = "extensionName")]
    pub extension_name: String,
}

impl HandshakeAck {
    pub fn matches(&self, expected_name: &str) -> bool {
        self.pong && self.extension_name == expected_name
    }

    /// Parse a raw response and check it against `expected_name`. Anything
    /// that is not exactly an ack from the expected extension is `false`.
    pub fn validates(raw: &Value, expected_name: &str) -> bool {
        serde_json::from_value::<HandshakeAck>(raw.clone())
            .map(|ack| ack.matches(expected_name))
            .unwrap_or(false)
    }
}

/// Generic success/failure answer to seed and auth-update messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Whatever the extension answered.
///
/// Any value counts as a successful exchange at the transport level; the
/// variants only make the known shapes convenient to inspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionResponse {
    Pong(HandshakeAck),
    Ack(AckResponse),
    Other(Value),
}

impl ExtensionResponse {
    pub fn from_value(raw: Value) -> Self {
        match serde_json::from_value::<ExtensionResponse>(raw.clone()) {
            Ok(parsed) => parsed,
            Err(_) => ExtensionResponse::Other(raw),
        }
    }

    pub fn as_ack(&self) -> Option<&AckResponse> {
        match self {
            ExtensionResponse::Ack(ack) => Some(ack),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
