use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// CandidateId
// ---------------------------------------------------------------------------

/// A guessed destination identifier for the companion extension.
///
/// Opaque: the bridge never inspects the contents, it only
/// compares, orders and forwards them to the host runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CandidateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CandidateId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CandidateId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The logged-in user record as returned by the backend's `/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_verified: bool,
    #[serde(default)]
    pub github_username: Option<String>,
    #[serde(default)]
    pub github_id: Option<String>,
    #[serde(default)]
    pub google_id: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl User {
    /// "First Last", falling back to the GitHub handle and then the email.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => self
                .github_username
                .clone()
                .unwrap_or_else(|| self.email.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "u-1".into(),
            email: "ada@example.com".into(),
            is_active: true,
            is_superuser: false,
            is_verified: true,
            github_username: Some("ada".into()),
            github_id: None,
            google_id: None,
            avatar_url: None,
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn candidate_id_serializes_as_plain_string() {
        let id = CandidateId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        assert_eq!(id.to_string(), "abc");
    }

    #[test]
    fn user_uses_camel_case_on_the_wire() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert_eq!(json["isActive"], true);
        assert_eq!(json["githubUsername"], "ada");
        assert!(json.get("is_active").is_none());
    }

    #[test]
    fn user_optional_fields_may_be_missing() {
        let user: User = serde_json::from_str(
            r#"{"id":"u-2","email":"b@example.com","isActive":true,"isSuperuser":false,"isVerified":false}"#,
        )
        .unwrap();
        assert!(user.avatar_url.is_none());
        assert_eq!(user.display_name(), "b@example.com");
    }

    #[test]
    fn display_name_prefers_real_name() {
        let mut user = sample_user();
        assert_eq!(user.display_name(), "ada");
        user.first_name = Some("Ada".into());
        user.last_name = Some("Lovelace".into());
        assert_eq!(user.display_name(), "Ada Lovelace");
    }
}
