use crate::config::AdminCredentials;
use crate::error::{AuthError, Result};
use crate::totp;
use portal_models::SharedClock;
use sha2::{Digest, Sha256};

/// Decides pass/fail for a password + one-time code pair. Holds no mutable
/// state; all side effects belong to the session issuer.
pub struct CredentialVerifier {
    password_digest: [u8; 32],
    totp_secret: Vec<u8>,
    clock: SharedClock,
}

impl CredentialVerifier {
    pub fn new(credentials: &AdminCredentials, clock: SharedClock) -> Result<Self> {
        Ok(Self {
            password_digest: digest(&credentials.password),
            totp_secret: totp::decode_secret(&credentials.totp_secret)?,
            clock,
        })
    }

    /// Check both factors. The code is waived when the device is already
    /// trusted. Either failure yields the same `InvalidCredentials`.
    pub fn verify(&self, password: &str, code: &str, device_trusted: bool) -> Result<()> {
        let password_ok = self.password_matches(password);
        let code_ok = device_trusted || self.code_matches(code);

        if password_ok & code_ok {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Both sides are hashed first so the comparison runs over equal-length
    /// input whatever the submitted length.
    fn password_matches(&self, password: &str) -> bool {
        totp::constant_time_compare(&digest(password), &self.password_digest)
    }

    fn code_matches(&self, code: &str) -> bool {
        let now = self.clock.timestamp().max(0) as u64;
        totp::verify_totp_at(&self.totp_secret, code, now)
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}
