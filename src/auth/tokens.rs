//! Token state snapshot

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tokens are refreshed when less than this many seconds remain.
pub const REFRESH_THRESHOLD_SECS: i64 = 300;

/// Immutable view of the current OAuth tokens.
///
/// The manager swaps whole snapshots; nothing edits one in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenState {
    /// Build the snapshot that follows a successful grant.
    ///
    /// A grant that omits the refresh token keeps the previous one. A
    /// non-positive or missing lifetime leaves the expiry unknown.
    pub fn from_grant(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<std::time::Duration>,
        previous: &TokenState,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = expires_in
            .filter(|d| !d.is_zero())
            .and_then(|d| Duration::from_std(d).ok())
            .map(|d| now + d);

        Self {
            access_token: Some(access_token),
            refresh_token: non_blank(refresh_token).or_else(|| previous.refresh().map(String::from)),
            expires_at,
        }
    }

    pub fn access(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn refresh(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn is_authorized(&self) -> bool {
        self.access().is_some() || self.refresh().is_some()
    }

    /// True when the access token should be refreshed before use.
    /// An unknown expiry counts as expiring.
    pub fn is_expiring_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => now + Duration::seconds(REFRESH_THRESHOLD_SECS) >= exp,
            None => true,
        }
    }

    pub fn is_expiring(&self) -> bool {
        self.is_expiring_at(Utc::now())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_expiry(secs_from_now: i64, now: DateTime<Utc>) -> TokenState {
        TokenState {
            access_token: Some("access".into()),
            refresh_token: Some("refresh".into()),
            expires_at: Some(now + Duration::seconds(secs_from_now)),
        }
    }

    #[test]
    fn test_unknown_expiry_is_expiring() {
        let state = TokenState {
            access_token: Some("access".into()),
            ..Default::default()
        };
        assert!(state.is_expiring());
    }

    #[test]
    fn test_threshold_boundary() {
        let now = Utc::now();
        assert!(with_expiry(299, now).is_expiring_at(now));
        assert!(with_expiry(300, now).is_expiring_at(now));
        assert!(!with_expiry(301, now).is_expiring_at(now));
    }

    #[test]
    fn test_authorized_needs_non_blank_token() {
        assert!(!TokenState::default().is_authorized());

        let blank = TokenState {
            access_token: Some("  ".into()),
            refresh_token: Some(String::new()),
            expires_at: None,
        };
        assert!(!blank.is_authorized());

        let refresh_only = TokenState {
            refresh_token: Some("r".into()),
            ..Default::default()
        };
        assert!(refresh_only.is_authorized());
    }

    #[test]
    fn test_grant_keeps_previous_refresh_token() {
        let now = Utc::now();
        let previous = with_expiry(10, now);
        let next = TokenState::from_grant(
            "new-access".into(),
            None,
            Some(std::time::Duration::from_secs(3600)),
            &previous,
            now,
        );
        assert_eq!(next.access(), Some("new-access"));
        assert_eq!(next.refresh(), Some("refresh"));
        assert_eq!(next.expires_at, Some(now + Duration::seconds(3600)));
    }

    #[test]
    fn test_grant_zero_lifetime_leaves_expiry_unknown() {
        let now = Utc::now();
        let next = TokenState::from_grant(
            "a".into(),
            Some("r".into()),
            Some(std::time::Duration::ZERO),
            &TokenState::default(),
            now,
        );
        assert_eq!(next.expires_at, None);
        assert!(next.is_expiring_at(now));
    }
}
