use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remaining session lifetime (seconds) below which a long-running process re-authenticates.
pub const SESSION_RENEWAL_THRESHOLD_SECS: i64 = 3600;

/// [`SESSION_RENEWAL_THRESHOLD_SECS`] as a duration.
pub fn session_renewal_threshold() -> Duration {
    Duration::seconds(SESSION_RENEWAL_THRESHOLD_SECS)
}

/// Bearer token with its expiry.
///
/// Used both for Mergin login sessions and for Google access tokens.
/// The `Debug` implementation never prints the token itself.
///
/// # Examples
///
/// ```
/// use core_auth::SessionToken;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let session = SessionToken::new("abc", now + Duration::minutes(30));
///
/// assert!(!session.is_expired_with_buffer(now, Duration::minutes(5)));
/// assert!(session.is_expired_with_buffer(now, Duration::hours(1)));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Token valid for `expires_in` seconds from `now`.
    pub fn expiring_in(token: impl Into<String>, now: DateTime<Utc>, expires_in: i64) -> Self {
        Self::new(token, now + Duration::seconds(expires_in))
    }

    /// Whether the token is expired, or expires within `buffer`, at `now`.
    pub fn is_expired_with_buffer(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now >= self.expires_at - buffer
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_expiry_with_buffer() {
        let session = SessionToken::expiring_in("t", noon(), 600);

        assert!(!session.is_expired_with_buffer(noon(), Duration::seconds(300)));
        assert!(session.is_expired_with_buffer(noon(), Duration::seconds(600)));
        assert!(session.is_expired_with_buffer(noon() + Duration::seconds(601), Duration::zero()));
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = SessionToken::new("super-secret", noon());
        let debug = format!("{:?}", session);

        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(session.authorization_header(), "Bearer super-secret");
    }
}
