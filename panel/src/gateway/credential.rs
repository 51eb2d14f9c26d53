//! Cached bearer token.

use chrono::{DateTime, Duration, Utc};

/// A gateway access token and the moment it stops being reused.
#[derive(Clone)]
pub struct Credential {
    token: String,
    expires_at: DateTime<Utc>,
}

impl Credential {
    /// Token issued at `now`, valid for `ttl`.
    pub fn issued(token: String, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token,
            expires_at: now + ttl,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// A credential is treated as absent once `now >= expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_until_expiry() {
        let now = Utc::now();
        let credential = Credential::issued("abc".to_string(), now, Duration::minutes(55));

        assert!(credential.is_valid_at(now));
        assert!(credential.is_valid_at(now + Duration::minutes(54)));
        assert!(!credential.is_valid_at(now + Duration::minutes(55)));
        assert!(!credential.is_valid_at(now + Duration::hours(2)));
    }

    #[test]
    fn test_zero_ttl_is_never_valid() {
        let now = Utc::now();
        let credential = Credential::issued("abc".to_string(), now, Duration::zero());
        assert!(!credential.is_valid_at(now));
    }

    #[test]
    fn test_debug_hides_token() {
        let credential = Credential::issued("very-secret".to_string(), Utc::now(), Duration::minutes(1));
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("very-secret"));
        assert_eq!(credential.token(), "very-secret");
    }
}
