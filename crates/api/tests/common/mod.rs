#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use portal_api::{routes, AppState, Config};
use portal_auth::totp;
use portal_cache::{CacheError, KeyValueStore, MemoryStore};
use portal_models::{Clock, ManualClock};
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse";
pub const TOTP_SECRET: &str = "JBSWY3DPEHPK3PXP";
pub const HOST: &str = "admin.test";
pub const ORIGIN: &str = "http://admin.test";
/// Socket peer of every request built by these helpers.
pub const PEER: &str = "198.51.100.7";

/// Switches that make the application's store fail, one concern at a time.
#[derive(Clone, Default)]
pub struct Faults {
    reads: Arc<AtomicBool>,
    session_writes: Arc<AtomicBool>,
    device_writes: Arc<AtomicBool>,
    counters: Arc<AtomicBool>,
}

impl Faults {
    pub fn fail_reads(&self) {
        self.reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_session_writes(&self) {
        self.session_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_device_writes(&self) {
        self.device_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_counters(&self) {
        self.counters.store(true, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> portal_cache::Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(CacheError::Backend("injected failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_write(&self, key: &str) -> portal_cache::Result<()> {
        if key.starts_with("session:") {
            Self::check(&self.session_writes)
        } else if key.starts_with("trusted_device:") {
            Self::check(&self.device_writes)
        } else {
            Ok(())
        }
    }
}

/// `MemoryStore` with failures injected through `Faults`.
struct FaultyStore {
    inner: MemoryStore,
    faults: Faults,
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn get(&self, key: &str) -> portal_cache::Result<Option<String>> {
        Faults::check(&self.faults.reads)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> portal_cache::Result<()> {
        self.faults.check_write(key)?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> portal_cache::Result<()> {
        self.inner.delete(key).await
    }

    async fn expire(&self, key: &str, ttl: u64) -> portal_cache::Result<()> {
        self.faults.check_write(key)?;
        self.inner.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> portal_cache::Result<Option<u64>> {
        Faults::check(&self.faults.reads)?;
        self.inner.ttl(key).await
    }

    async fn incr_with_ttl(&self, key: &str, ttl: u64) -> portal_cache::Result<i64> {
        Faults::check(&self.faults.counters)?;
        self.inner.incr_with_ttl(key, ttl).await
    }

    async fn purge_expired(&self) -> portal_cache::Result<u64> {
        self.inner.purge_expired().await
    }

    async fn ping(&self) -> portal_cache::Result<()> {
        self.inner.ping().await
    }
}

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub store: MemoryStore,
    pub faults: Faults,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// The code an authenticator would show right now.
    pub fn code(&self) -> String {
        let secret = totp::decode_secret(TOTP_SECRET).unwrap();
        totp::totp_at(&secret, self.clock.timestamp() as u64)
    }

    /// A six-digit code that is not valid in the current window.
    pub fn wrong_code(&self) -> String {
        let secret = totp::decode_secret(TOTP_SECRET).unwrap();
        let now = self.clock.timestamp() as u64;
        (0..1_000_000u32)
            .map(|n| format!("{:06}", n))
            .find(|c| !totp::verify_totp_at(&secret, c, now))
            .unwrap()
    }

    /// Log in with password and the current code; returns the `ml.sid` pair.
    pub async fn login(&self) -> String {
        let code = self.code();
        let response = self
            .send(login_request(&[("password", PASSWORD), ("token", code.as_str())], None))
            .await;
        assert_eq!(response.status(), 303);
        cookie_pair(&response, "ml.sid").expect("session cookie")
    }
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = [
        ("ADMIN_PASSWORD", PASSWORD),
        ("ADMIN_TOTP_SECRET", TOTP_SECRET),
        ("SESSION_SECRET", "integration-test-secret"),
        ("SESSION_STORE", "memory"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        env.insert(k.to_string(), v.to_string());
    }

    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

/// Build the full application router, with every middleware layer, on an
/// in-memory store driven by a manual clock.
pub fn build_test_app() -> TestApp {
    build_test_app_with(&[])
}

pub fn build_test_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let clock = Arc::new(ManualClock::starting_now());
    let store = MemoryStore::with_clock(clock.clone());
    let faults = Faults::default();
    let faulty = FaultyStore {
        inner: store.clone(),
        faults: faults.clone(),
    };
    let state = AppState::new(test_config(overrides), Arc::new(faulty), clock.clone()).unwrap();

    TestApp {
        router: routes::create_router(Arc::new(state)),
        clock,
        store,
        faults,
    }
}

fn form_body(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v.replace(' ', "+")))
        .collect::<Vec<_>>()
        .join("&")
}

/// Attach the socket peer the server would see via `ConnectInfo`.
pub fn from_peer(mut request: Request<Body>, ip: &str) -> Request<Body> {
    let addr = SocketAddr::new(ip.parse().unwrap(), 50_000);
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// Same-origin form post, as a browser would send it.
pub fn form_post(path: &str, fields: &[(&str, &str)], cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::HOST, HOST)
        .header(header::ORIGIN, ORIGIN)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    from_peer(builder.body(Body::from(form_body(fields))).unwrap(), PEER)
}

pub fn login_request(fields: &[(&str, &str)], cookies: Option<&str>) -> Request<Body> {
    form_post("/admin/login", fields, cookies)
}

pub fn get(path: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(header::HOST, HOST);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `name=value` of the `Set-Cookie` for `name`, ready to send back.
pub fn cookie_pair(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&prefix))
        .and_then(|c| c.split(';').next().map(str::to_string))
}

pub fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

pub async fn logged_in(app: &TestApp, cookies: &str) -> bool {
    let response = app.send(get("/admin/check", Some(cookies))).await;
    body_json(response).await["loggedIn"].as_bool().unwrap()
}
