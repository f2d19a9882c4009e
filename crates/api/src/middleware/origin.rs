use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;

const DEV_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

/// Why a mutating request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginRejection {
    BadOrigin,
    BadReferer,
    OriginRequired,
}

impl OriginRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginRejection::BadOrigin => "Bad Origin",
            OriginRejection::BadReferer => "Bad Referer",
            OriginRejection::OriginRequired => "Origin required",
        }
    }
}

/// Cross-site request guard for the admin form posts.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: HashSet<String>,
}

impl OriginPolicy {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .filter_map(|o| normalize_origin(o.as_ref()))
                .collect(),
        }
    }

    /// Decide from `Origin`, then `Referer`, then Fetch Metadata.
    pub fn check(&self, headers: &HeaderMap, uri: &Uri) -> Result<(), OriginRejection> {
        let host = request_host(headers, uri);

        if let Some(origin) = header_str(headers, "origin") {
            return if self.is_allowed(origin, &host) {
                Ok(())
            } else {
                Err(OriginRejection::BadOrigin)
            };
        }

        // Form posts may carry a Referer without an Origin
        if let Some(referer) = header_str(headers, "referer") {
            return match normalize_origin(referer) {
                Some(origin) if self.is_allowed(&origin, &host) => Ok(()),
                _ => Err(OriginRejection::BadReferer),
            };
        }

        let fetch_site = header_str(headers, "sec-fetch-site")
            .unwrap_or_default()
            .to_ascii_lowercase();
        if matches!(fetch_site.as_str(), "same-origin" | "same-site" | "none") {
            return Ok(());
        }

        // Some browsers omit Fetch Metadata on first-party navigations
        let fetch_mode = header_str(headers, "sec-fetch-mode").unwrap_or_default();
        let fetch_dest = header_str(headers, "sec-fetch-dest").unwrap_or_default();
        if fetch_site.is_empty()
            && fetch_mode.eq_ignore_ascii_case("navigate")
            && fetch_dest.eq_ignore_ascii_case("document")
        {
            return Ok(());
        }

        Err(OriginRejection::OriginRequired)
    }

    fn is_allowed(&self, origin: &str, request_host: &str) -> bool {
        let origin_host = origin_host(origin);

        if is_dev_host(&origin_host) && is_dev_host(request_host) {
            return true;
        }
        if !origin_host.is_empty() && origin_host == request_host {
            return true;
        }

        normalize_origin(origin).is_some_and(|o| self.allowed.contains(&o))
    }
}

/// Middleware for state-changing admin routes.
pub async fn enforce_trusted_origin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match state.origin_policy.check(request.headers(), request.uri()) {
        Ok(()) => Ok(next.run(request).await),
        Err(rejection) => {
            tracing::warn!(
                path = %request.uri().path(),
                "Rejected cross-site request: {}",
                rejection.as_str()
            );
            Err(ApiError::Forbidden(rejection.as_str()))
        }
    }
}

/// Loopback origins used while developing the site locally.
pub fn is_local_dev_origin(origin: &str) -> bool {
    normalize_origin(origin).is_some() && is_dev_host(&origin_host(origin))
}

/// `scheme://host[:port]` with the default port dropped, or `None` for
/// anything that is not an absolute http(s) URL.
pub fn normalize_origin(value: &str) -> Option<String> {
    let uri: Uri = value.trim().parse().ok()?;
    let scheme = uri.scheme_str()?.to_ascii_lowercase();
    let default_port = match scheme.as_str() {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };
    let host = uri.host().filter(|h| !h.is_empty())?.to_ascii_lowercase();

    Some(match uri.port_u16() {
        Some(port) if port != default_port => format!("{}://{}:{}", scheme, host, port),
        _ => format!("{}://{}", scheme, host),
    })
}

/// Lowercase, no `www.`, no port.
fn normalize_host(value: &str) -> String {
    let value = value.trim().to_ascii_lowercase();
    let value = value.strip_prefix("www.").unwrap_or(&value);
    value.split(':').next().unwrap_or_default().to_string()
}

fn origin_host(origin: &str) -> String {
    origin
        .trim()
        .parse::<Uri>()
        .ok()
        .and_then(|uri| uri.host().map(normalize_host))
        .unwrap_or_default()
}

fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    let first = |name: &str| {
        header_str(headers, name)
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    first("x-forwarded-host")
        .or_else(|| first("host"))
        .or_else(|| uri.host())
        .map(normalize_host)
        .unwrap_or_default()
}

fn is_dev_host(host: &str) -> bool {
    DEV_HOSTS.contains(&host)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
