use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Duration;
use portal_cache::{session_cache_key, SharedStore};
use portal_models::{SessionData, SharedClock};
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const SESSION_COOKIE: &str = "ml.sid";
pub const TRUSTED_DEVICE_COOKIE: &str = "ml.td";

const NONCE_LEN: usize = 12;

/// Attributes shared by every cookie the admin area sets.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub secure: bool,
    /// `SameSite=Strict` on the session cookie instead of `Lax`.
    pub strict_session: bool,
    pub session_max_age: u64,
    pub trusted_device_max_age: u64,
}

impl CookieSettings {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            secure: config.production,
            strict_session: config.production,
            session_max_age: config.idle_timeout.num_seconds().max(0) as u64,
            trusted_device_max_age: config.trusted_device_ttl.num_seconds().max(0) as u64,
        }
    }

    fn finish(&self, mut cookie: String) -> String {
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Server-side sessions behind a small encrypted cookie holding only the
/// session id. The record itself lives in the key-value store.
#[derive(Clone)]
pub struct SessionManager {
    cipher: Aes256Gcm,
    store: SharedStore,
    clock: SharedClock,
    idle_timeout: Duration,
    cookies: CookieSettings,
}

impl SessionManager {
    pub fn new(config: &AuthConfig, store: SharedStore, clock: SharedClock) -> Result<Self> {
        // Derive a 256-bit key from the secret using SHA-256
        let key_bytes = Sha256::digest(config.session_secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| AuthError::Internal(format!("Session cipher init failed: {}", e)))?;

        Ok(Self {
            cipher,
            store,
            clock,
            idle_timeout: config.idle_timeout,
            cookies: CookieSettings::from_config(config),
        })
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn cookie_settings(&self) -> &CookieSettings {
        &self.cookies
    }

    /// Store `data` under a brand-new id.
    pub async fn create(&self, data: &SessionData) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.save(&session_id, data).await?;
        tracing::debug!("Created session {}", short_id(&session_id));
        Ok(session_id)
    }

    /// Replace whatever session the browser arrived with by a fresh one.
    /// The old id is destroyed and never carries over into the new session.
    pub async fn regenerate(&self, previous_id: Option<&str>, data: &SessionData) -> Result<String> {
        if let Some(previous_id) = previous_id {
            self.destroy(previous_id).await?;
        }
        self.create(data).await
    }

    /// The session for `session_id`, if present and inside its window.
    /// Expired records are deleted on sight.
    pub async fn load(&self, session_id: &str) -> Result<Option<SessionData>> {
        let key = session_cache_key(session_id);
        let Some(session) = self.store.get_json::<SessionData>(&key).await? else {
            return Ok(None);
        };

        if session.is_expired(self.clock.now()) {
            tracing::debug!("Session {} expired", short_id(session_id));
            self.store.delete(&key).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Slide the inactivity window forward and persist it.
    pub async fn touch(&self, session_id: &str, session: &mut SessionData) -> Result<()> {
        session.touch(self.clock.now(), self.idle_timeout);
        self.save(session_id, session).await
    }

    pub async fn destroy(&self, session_id: &str) -> Result<()> {
        self.store.delete(&session_cache_key(session_id)).await?;
        tracing::debug!("Destroyed session {}", short_id(session_id));
        Ok(())
    }

    async fn save(&self, session_id: &str, data: &SessionData) -> Result<()> {
        let remaining = (data.expires_at - self.clock.now()).num_seconds().max(1) as u64;
        self.store
            .set_json(&session_cache_key(session_id), data, Some(remaining))
            .await?;
        Ok(())
    }

    /// Extract and decrypt the session id from request cookies.
    pub fn session_id_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let encoded = cookie_value(headers, SESSION_COOKIE)?;
        self.decrypt_id(&encoded)
    }

    /// `Set-Cookie` value carrying the encrypted session id.
    pub fn session_cookie(&self, session_id: &str) -> Result<String> {
        let encoded = self.encrypt_id(session_id)?;
        Ok(self.cookies.finish(format!(
            "{}={}; HttpOnly; SameSite={}; Path=/; Max-Age={}",
            SESSION_COOKIE,
            encoded,
            self.session_same_site(),
            self.cookies.session_max_age
        )))
    }

    pub fn clear_session_cookie(&self) -> String {
        self.cookies.finish(format!(
            "{}=; HttpOnly; SameSite={}; Path=/; Max-Age=0",
            SESSION_COOKIE,
            self.session_same_site()
        ))
    }

    pub fn trusted_device_cookie(&self, raw_token: &str) -> String {
        self.cookies.finish(format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/admin; Max-Age={}",
            TRUSTED_DEVICE_COOKIE, raw_token, self.cookies.trusted_device_max_age
        ))
    }

    pub fn clear_trusted_device_cookie(&self) -> String {
        self.cookies.finish(format!(
            "{}=; HttpOnly; SameSite=Lax; Path=/admin; Max-Age=0",
            TRUSTED_DEVICE_COOKIE
        ))
    }

    fn session_same_site(&self) -> &'static str {
        if self.cookies.strict_session {
            "Strict"
        } else {
            "Lax"
        }
    }

    // ── Cookie cipher ────────────────────────────────────────────────

    fn encrypt_id(&self, session_id: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, session_id.as_bytes())
            .map_err(|e| AuthError::Internal(format!("Session encrypt error: {}", e)))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(&payload))
    }

    /// Anything that fails to decode or authenticate is simply "no session".
    fn decrypt_id(&self, encoded: &str) -> Option<String> {
        let payload = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        if payload.len() <= NONCE_LEN {
            return None;
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

/// First value of cookie `name` across every `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(&prefix))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn trusted_device_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, TRUSTED_DEVICE_COOKIE)
}

/// Enough of an id to correlate log lines without making it replayable.
fn short_id(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}
