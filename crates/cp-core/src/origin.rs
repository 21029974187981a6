//! Page-origin allow-list matching.
//!
//! Every envelope sent to the companion extension carries the origin of the
//! page that produced it. The extension compares that value against the
//! same allow-list, so a page origin outside the list is a configuration
//! error rather than something to discover at runtime.

/// Origins the web app is served from, as configured by default.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:3001",
    "http://localhost:3002",
    "https://codepress.dev",
    "https://editable.codepress.dev",
];

/// Returns `true` if `origin` is accepted by `allowed_origins`.
///
/// An entry matches on exact equality, or when the origin is the entry
/// followed by `:<port>` (so `http://localhost` admits
/// `http://localhost:4000`). Anything else after the entry is rejected,
/// which keeps `https://codepress.dev.evil.com` out.
pub fn is_allowed_origin(origin: &str, allowed_origins: &[String]) -> bool {
    allowed_origins.iter().any(|allowed| {
        if origin == allowed {
            return true;
        }

        match origin.strip_prefix(allowed.as_str()) {
            Some(remainder) => match remainder.strip_prefix(':') {
                Some(port) => !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()),
                None => false,
            },
            None => false,
        }
    })
}

/// [`DEFAULT_ALLOWED_ORIGINS`] as owned strings.
pub fn default_allowed_origins() -> Vec<String> {
    DEFAULT_ALLOWED_ORIGINS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
