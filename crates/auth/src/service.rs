use crate::config::AuthConfig;
use crate::credentials::CredentialVerifier;
use crate::error::Result;
use crate::session::SessionManager;
use crate::trusted_device::TrustedDeviceStore;
use chrono::Duration;
use portal_cache::SharedStore;
use portal_models::{SessionData, SharedClock};

/// One submitted login form plus the cookies it arrived with. No `Debug`,
/// it carries the password.
#[derive(Clone, Default)]
pub struct LoginAttempt {
    pub password: String,
    pub code: String,
    pub remember_device: bool,
    pub trusted_device_token: Option<String>,
    pub previous_session_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session_id: String,
    pub session: SessionData,
    /// `Set-Cookie` values, session cookie first.
    pub set_cookies: Vec<String>,
    pub device_trusted: bool,
    /// Raw token of a newly registered device, if one was minted.
    pub issued_device_token: Option<String>,
}

/// Check-then-issue for the admin area: credential verification, the
/// trusted-device shortcut and session issue as one operation.
pub struct AdminAuthService {
    verifier: CredentialVerifier,
    sessions: SessionManager,
    trusted_devices: TrustedDeviceStore,
    clock: SharedClock,
    trusted_device_ttl: Duration,
}

impl AdminAuthService {
    pub fn new(config: &AuthConfig, store: SharedStore, clock: SharedClock) -> Result<Self> {
        Ok(Self {
            verifier: CredentialVerifier::new(&config.credentials, clock.clone())?,
            sessions: SessionManager::new(config, store.clone(), clock.clone())?,
            trusted_devices: TrustedDeviceStore::new(store, clock.clone()),
            clock,
            trusted_device_ttl: config.trusted_device_ttl,
        })
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn trusted_devices(&self) -> &TrustedDeviceStore {
        &self.trusted_devices
    }

    pub async fn login(&self, attempt: LoginAttempt) -> Result<LoginOutcome> {
        let device_trusted = match attempt.trusted_device_token.as_deref() {
            Some(token) => self.trusted_devices.is_trusted(token).await,
            None => false,
        };

        if let Err(e) = self
            .verifier
            .verify(&attempt.password, &attempt.code, device_trusted)
        {
            tracing::warn!(device_trusted, "Admin login rejected");
            return Err(e);
        }

        let session = SessionData::admin(self.clock.now(), self.sessions.idle_timeout());
        let session_id = self
            .sessions
            .regenerate(attempt.previous_session_id.as_deref(), &session)
            .await?;
        let mut set_cookies = vec![self.sessions.session_cookie(&session_id)?];

        // A device that is already trusted keeps its token; no second record.
        let mut issued_device_token = None;
        if attempt.remember_device && !device_trusted {
            match self.trusted_devices.issue(self.trusted_device_ttl).await {
                Ok(token) => {
                    set_cookies.push(self.sessions.trusted_device_cookie(&token));
                    issued_device_token = Some(token);
                }
                Err(e) => {
                    tracing::warn!("Could not register trusted device, continuing without: {}", e);
                }
            }
        }

        tracing::info!(device_trusted, "Admin login succeeded");

        Ok(LoginOutcome {
            session_id,
            session,
            set_cookies,
            device_trusted,
            issued_device_token,
        })
    }

    /// End the session and return the cookies that clear it. With
    /// `forget_device` the presented trusted-device token is revoked too.
    /// Storage failures are logged; the browser is logged out regardless.
    pub async fn logout(
        &self,
        session_id: Option<&str>,
        trusted_device_token: Option<&str>,
        forget_device: bool,
    ) -> Vec<String> {
        if let Some(session_id) = session_id {
            if let Err(e) = self.sessions.destroy(session_id).await {
                tracing::warn!("Failed to destroy session on logout: {}", e);
            }
        }

        let mut set_cookies = vec![self.sessions.clear_session_cookie()];

        if forget_device {
            if let Some(token) = trusted_device_token {
                if let Err(e) = self.trusted_devices.revoke(token).await {
                    tracing::warn!("Failed to revoke trusted device on logout: {}", e);
                }
            }
            set_cookies.push(self.sessions.clear_trusted_device_cookie());
        }

        tracing::info!(forget_device, "Admin logged out");
        set_cookies
    }
}
