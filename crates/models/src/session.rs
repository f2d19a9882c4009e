use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Server-side session state, stored as JSON under `session:{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub logged_in: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// End of the sliding inactivity window.
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    /// A freshly authenticated admin session.
    pub fn admin(now: DateTime<Utc>, idle_timeout: Duration) -> Self {
        Self {
            logged_in: true,
            is_admin: true,
            created_at: now,
            last_seen_at: now,
            expires_at: now + idle_timeout,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_authenticated_admin(&self) -> bool {
        self.logged_in && self.is_admin
    }

    /// Slide the inactivity window forward from `now`.
    pub fn touch(&mut self, now: DateTime<Utc>, idle_timeout: Duration) {
        self.last_seen_at = now;
        self.expires_at = now + idle_timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_session_window() {
        let now = Utc::now();
        let session = SessionData::admin(now, Duration::minutes(15));

        assert!(session.is_authenticated_admin());
        assert!(!session.is_expired(now + Duration::minutes(14)));
        assert!(session.is_expired(now + Duration::minutes(15)));
    }

    #[test]
    fn test_touch_slides_expiry() {
        let now = Utc::now();
        let mut session = SessionData::admin(now, Duration::minutes(15));

        session.touch(now + Duration::minutes(10), Duration::minutes(15));
        assert!(!session.is_expired(now + Duration::minutes(20)));
        assert!(session.is_expired(now + Duration::minutes(25)));
        assert_eq!(session.created_at, now);
    }
}
