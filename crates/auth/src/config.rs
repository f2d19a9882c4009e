use crate::error::{AuthError, Result};
use crate::totp;
use chrono::Duration;
use std::fmt;

const DEFAULT_IDLE_MINUTES: i64 = 15;
const DEFAULT_TRUSTED_DEVICE_DAYS: i64 = 30;
const MAX_IDLE_MINUTES: i64 = 24 * 60;
const MAX_TRUSTED_DEVICE_DAYS: i64 = 365;

/// The admin's secrets, loaded once at startup and injected into the
/// credential verifier.
#[derive(Clone)]
pub struct AdminCredentials {
    pub password: String,
    /// Base32 TOTP shared secret.
    pub totp_secret: String,
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("password", &"[REDACTED]")
            .field("totp_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub credentials: AdminCredentials,
    /// Key material for the session cookie cipher.
    pub session_secret: String,
    /// Sliding inactivity window of a session.
    pub idle_timeout: Duration,
    pub trusted_device_ttl: Duration,
    /// Production turns on `Secure` cookies and `SameSite=Strict` sessions.
    pub production: bool,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("credentials", &self.credentials)
            .field("session_secret", &"[REDACTED]")
            .field("idle_timeout", &self.idle_timeout)
            .field("trusted_device_ttl", &self.trusted_device_ttl)
            .field("production", &self.production)
            .finish()
    }
}

impl AuthConfig {
    /// Load from the environment. Refuses to build without every secret; there
    /// are no default passwords.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(AuthError::ConfigurationMissing(key))
        };

        let credentials = AdminCredentials {
            password: required("ADMIN_PASSWORD")?,
            totp_secret: required("ADMIN_TOTP_SECRET")?.trim().to_uppercase(),
        };
        let session_secret = required("SESSION_SECRET")?;

        if totp::decode_secret(&credentials.totp_secret).is_err() {
            return Err(AuthError::InvalidConfiguration(
                "ADMIN_TOTP_SECRET is not valid base32".to_string(),
            ));
        }

        let idle_timeout = bounded_duration(
            &lookup,
            "SESSION_IDLE_MINUTES",
            DEFAULT_IDLE_MINUTES,
            MAX_IDLE_MINUTES,
            Duration::try_minutes,
        )?;
        let trusted_device_ttl = bounded_duration(
            &lookup,
            "TRUSTED_DEVICE_DAYS",
            DEFAULT_TRUSTED_DEVICE_DAYS,
            MAX_TRUSTED_DEVICE_DAYS,
            Duration::try_days,
        )?;

        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("NODE_ENV"))
            .unwrap_or_else(|| "development".to_string());

        Ok(Self {
            credentials,
            session_secret,
            idle_timeout,
            trusted_device_ttl,
            production: environment.eq_ignore_ascii_case("production"),
        })
    }
}

/// Unset or unparsable falls back to `default`; a number outside
/// `1..=max` is a configuration error.
fn bounded_duration<F>(
    lookup: &F,
    key: &str,
    default: i64,
    max: i64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default);

    if !(1..=max).contains(&value) {
        return Err(AuthError::InvalidConfiguration(format!(
            "{} must be between 1 and {}",
            key, max
        )));
    }
    unit(value).ok_or_else(|| AuthError::InvalidConfiguration(format!("{} is out of range", key)))
}
