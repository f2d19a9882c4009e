pub mod config;
pub mod credentials;
pub mod error;
pub mod service;
pub mod session;
pub mod totp;
pub mod trusted_device;

#[cfg(test)]
mod test_support;

pub use config::{AdminCredentials, AuthConfig};
pub use credentials::CredentialVerifier;
pub use error::{AuthError, Result};
pub use service::{AdminAuthService, LoginAttempt, LoginOutcome};
pub use session::{CookieSettings, SessionManager};
pub use trusted_device::TrustedDeviceStore;
