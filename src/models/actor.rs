//! Identity and request context supplied by the calling application.

use serde::{Deserialize, Serialize};

/// Maximum stored length of a user agent string
pub const USER_AGENT_MAX_LEN: usize = 500;

/// Canonical form of an email for matching: trimmed and lowercased.
///
/// Every email comparison between requests and accounts goes through this, in
/// memory and in SQL (`LOWER(TRIM(..))`).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// An authenticated account performing (or benefiting from) an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub is_staff: bool,
}

impl Actor {
    pub fn new(id: i64, display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            email: email.into(),
            is_staff: false,
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }
}

/// Best-effort metadata about the HTTP request behind an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
}

impl RequestMeta {
    /// Build request metadata from raw header values.
    ///
    /// The client IP is the first hop of `X-Forwarded-For` when present, else the
    /// socket peer address. User agents are cut to [`USER_AGENT_MAX_LEN`] characters.
    pub fn from_headers(
        forwarded_for: Option<&str>,
        remote_addr: Option<&str>,
        user_agent: Option<&str>,
        session_id: Option<&str>,
    ) -> Self {
        let ip_address = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or(remote_addr.map(str::trim).filter(|v| !v.is_empty()))
            .map(str::to_string);

        let user_agent = user_agent
            .filter(|ua| !ua.is_empty())
            .map(|ua| ua.chars().take(USER_AGENT_MAX_LEN).collect());

        Self {
            ip_address,
            user_agent,
            session_id: session_id.filter(|s| !s.is_empty()).map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_meta_prefers_forwarded_for() {
        let meta = RequestMeta::from_headers(
            Some("203.0.113.7, 10.0.0.1"),
            Some("10.0.0.1"),
            Some("Mozilla/5.0"),
            Some("abc123"),
        );
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(meta.session_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_request_meta_falls_back_to_remote_addr() {
        let meta = RequestMeta::from_headers(None, Some("127.0.0.1"), None, Some(""));
        assert_eq!(meta.ip_address.as_deref(), Some("127.0.0.1"));
        assert!(meta.user_agent.is_none());
        assert!(meta.session_id.is_none());
    }

    #[test]
    fn test_request_meta_truncates_user_agent() {
        let long = "x".repeat(800);
        let meta = RequestMeta::from_headers(None, None, Some(&long), None);
        assert_eq!(meta.user_agent.unwrap().len(), USER_AGENT_MAX_LEN);
    }
}
