use axum::http::{header, HeaderName, HeaderValue};

/// Headers added to every response unless a handler already set them.
pub fn security_headers(production: bool) -> Vec<(HeaderName, HeaderValue)> {
    vec![
        (
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ),
        (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
        (
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
        (
            header::CONTENT_SECURITY_POLICY,
            content_security_policy(production),
        ),
    ]
}

pub fn content_security_policy(production: bool) -> HeaderValue {
    let mut directives = vec![
        "default-src 'self'",
        "script-src 'self'",
        "script-src-attr 'none'",
        "style-src 'self' 'unsafe-inline' https://fonts.googleapis.com",
        "font-src 'self' https://fonts.googleapis.com https://fonts.gstatic.com data:",
        "img-src 'self' data: blob:",
        "connect-src 'self'",
        "object-src 'none'",
        "base-uri 'self'",
        "form-action 'self'",
        "frame-ancestors 'self'",
    ];
    if production {
        directives.push("upgrade-insecure-requests");
    }

    HeaderValue::from_str(&directives.join("; "))
        .unwrap_or_else(|_| HeaderValue::from_static("default-src 'self'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_upgrades_only_in_production() {
        let dev = content_security_policy(false);
        let prod = content_security_policy(true);

        assert!(dev.to_str().unwrap().contains("frame-ancestors 'self'"));
        assert!(!dev.to_str().unwrap().contains("upgrade-insecure-requests"));
        assert!(prod.to_str().unwrap().ends_with("upgrade-insecure-requests"));
    }

    #[test]
    fn test_header_set() {
        let headers = security_headers(false);
        assert!(headers
            .iter()
            .any(|(name, value)| *name == header::X_CONTENT_TYPE_OPTIONS && value == "nosniff"));
        assert!(headers
            .iter()
            .any(|(name, _)| name.as_str() == "cross-origin-opener-policy"));
    }
}
