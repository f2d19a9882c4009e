use crate::config::{Config, BODY_LIMIT_BYTES};
use crate::handlers;
use crate::middleware::{self, origin::{is_local_dev_origin, normalize_origin}};
use crate::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// The full application: routes plus every middleware layer.
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        // The old static admin page
        .route("/html/school/admin.html", get(handlers::admin::legacy_admin_page))
        // Admin login: origin guard first, then the attempt budget
        .route(
            "/admin/login",
            get(handlers::admin::login_page).merge(
                post(handlers::admin::login_submit)
                    .layer(from_fn_with_state(state.clone(), middleware::rate_limit_login))
                    .layer(from_fn_with_state(state.clone(), middleware::enforce_trusted_origin)),
            ),
        )
        .route("/admin/dashboard", get(handlers::admin::dashboard))
        .route("/admin/check", get(handlers::admin::session_status))
        .route("/api/admin-session", get(handlers::admin::session_status))
        .route(
            "/admin/logout",
            post(handlers::admin::logout)
                .layer(from_fn_with_state(state.clone(), middleware::enforce_trusted_origin)),
        )
        .layer(from_fn_with_state(state.clone(), middleware::load_session))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES));

    for (name, value) in middleware::security_headers(state.config.is_production()) {
        router = router.layer(SetResponseHeaderLayer::if_not_present(name, value));
    }

    router
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for the site's own origins. Outside production,
/// loopback origins and the literal `null` origin are accepted too.
fn cors_layer(config: &Config) -> CorsLayer {
    let allowed: HashSet<String> = config.allowed_origins.iter().cloned().collect();
    let production = config.is_production();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let Ok(origin) = origin.to_str() else {
                return false;
            };
            if !production && (origin == "null" || is_local_dev_origin(origin)) {
                return true;
            }
            normalize_origin(origin).is_some_and(|o| allowed.contains(&o))
        }))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
