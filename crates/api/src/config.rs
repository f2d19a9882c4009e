use crate::middleware::origin::normalize_origin;
use portal_auth::{AuthConfig, AuthError};
use portal_cache::CacheConfig;
use portal_database::DatabaseConfig;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Origins the public site is served from, on top of `SITE_ORIGIN`/`SITE_ORIGIN_2`.
const DEFAULT_ORIGINS: &[&str] = &[
    "https://martin-luther-website.onrender.com",
    "https://www.martinlutheroshkosh.com",
    "https://martinlutheroshkosh.com",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
];

/// Request bodies above this are refused before any handler runs.
pub const BODY_LIMIT_BYTES: usize = 25 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Where sessions, trusted devices and rate-limit counters live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
    Redis,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Sqlite => "sqlite",
            StoreBackend::Memory => "memory",
            StoreBackend::Redis => "redis",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub store: StoreBackend,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub login_rate_limit: RateLimitConfig,
    pub cleanup_interval_secs: u64,
    /// Reverse proxies in front of the server. Zero means `X-Forwarded-For`
    /// is ignored and the socket peer is the client.
    pub trusted_proxy_hops: usize,
    /// Normalised `scheme://host[:port]` origins accepted by the origin guard.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth = AuthConfig::from_lookup(&lookup)?;

        let store_raw = lookup("SESSION_STORE").unwrap_or_default();
        let store = store_raw.parse().map_err(|value| ConfigError::InvalidValue {
            key: "SESSION_STORE",
            value,
        })?;

        let server_port = match lookup("SERVER_PORT").or_else(|| lookup("PORT")) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "SERVER_PORT",
                value: raw,
            })?,
            None => 3000,
        };

        let defaults = RateLimitConfig::default();
        let login_rate_limit = RateLimitConfig {
            max_attempts: parse_or(&lookup, "LOGIN_RATE_LIMIT_MAX", defaults.max_attempts),
            window_seconds: parse_or(
                &lookup,
                "LOGIN_RATE_LIMIT_WINDOW_SECS",
                defaults.window_seconds,
            ),
        };

        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").unwrap_or_else(|| DatabaseConfig::default().url),
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5),
            ..DatabaseConfig::default()
        };
        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig {
            url: lookup("REDIS_URL").unwrap_or(cache_defaults.url),
            key_prefix: lookup("REDIS_KEY_PREFIX").unwrap_or(cache_defaults.key_prefix),
        };

        let mut candidates: Vec<String> = [lookup("SITE_ORIGIN"), lookup("SITE_ORIGIN_2")]
            .into_iter()
            .flatten()
            .collect();
        candidates.extend(DEFAULT_ORIGINS.iter().map(|o| o.to_string()));

        let mut allowed_origins = Vec::new();
        for raw in &candidates {
            // Malformed values are skipped rather than failing startup
            match normalize_origin(raw) {
                Some(origin) if !allowed_origins.contains(&origin) => allowed_origins.push(origin),
                Some(_) => {}
                None => tracing::warn!("Ignoring malformed site origin: {}", raw),
            }
        }

        Ok(Self {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port,
            environment: lookup("ENVIRONMENT")
                .or_else(|| lookup("NODE_ENV"))
                .unwrap_or_else(|| "development".to_string()),
            store,
            database,
            cache,
            auth,
            login_rate_limit,
            cleanup_interval_secs: parse_or(&lookup, "CLEANUP_INTERVAL_SECS", 3600).max(1),
            trusted_proxy_hops: parse_or(&lookup, "TRUSTED_PROXY_HOPS", 0),
            allowed_origins,
        })
    }

    pub fn is_production(&self) -> bool {
        self.auth.production
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .filter(|v| *v > T::default())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let mut map: HashMap<String, String> = [
            ("ADMIN_PASSWORD", "P"),
            ("ADMIN_TOTP_SECRET", "JBSWY3DPEHPK3PXP"),
            ("SESSION_SECRET", "s3cret"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.store, StoreBackend::Sqlite);
        assert_eq!(config.login_rate_limit.max_attempts, 5);
        assert_eq!(config.login_rate_limit.window_seconds, 60);
        assert_eq!(config.cleanup_interval_secs, 3600);
        assert_eq!(config.trusted_proxy_hops, 0);
        assert_eq!(config.database.url, "sqlite://data/sessions.sqlite?mode=rwc");
        assert!(config
            .allowed_origins
            .contains(&"https://martinlutheroshkosh.com".to_string()));
        assert!(!config.is_production());
    }

    #[test]
    fn test_site_origins_are_normalised() {
        let config = Config::from_lookup(lookup(&[
            ("SITE_ORIGIN", "https://Example.org/some/path"),
            ("SITE_ORIGIN_2", "not a url"),
        ]))
        .unwrap();

        assert_eq!(config.allowed_origins[0], "https://example.org");
        assert!(!config.allowed_origins.iter().any(|o| o.contains("not a url")));
    }

    #[test]
    fn test_store_backend_selection() {
        let config = Config::from_lookup(lookup(&[("SESSION_STORE", "Memory")])).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);

        assert!(matches!(
            Config::from_lookup(lookup(&[("SESSION_STORE", "postgres")])),
            Err(ConfigError::InvalidValue { key: "SESSION_STORE", .. })
        ));
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let result = Config::from_lookup(|key: &str| {
            (key != "SESSION_SECRET")
                .then(|| lookup(&[])(key))
                .flatten()
        });
        assert!(matches!(
            result,
            Err(ConfigError::Auth(AuthError::ConfigurationMissing("SESSION_SECRET")))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SERVER_PORT", "8080"),
            ("LOGIN_RATE_LIMIT_MAX", "3"),
            ("LOGIN_RATE_LIMIT_WINDOW_SECS", "120"),
            ("NODE_ENV", "production"),
            ("TRUSTED_PROXY_HOPS", "1"),
        ]))
        .unwrap();

        assert_eq!(config.server_port, 8080);
        assert_eq!(config.trusted_proxy_hops, 1);
        assert_eq!(config.login_rate_limit.max_attempts, 3);
        assert_eq!(config.login_rate_limit.window_seconds, 120);
        assert!(config.is_production());
        assert_eq!(config.environment, "production");
    }

    #[test]
    fn test_bad_port_is_rejected() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("SERVER_PORT", "eighty")])),
            Err(ConfigError::InvalidValue { key: "SERVER_PORT", .. })
        ));
    }
}
