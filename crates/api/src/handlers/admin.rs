use askama::Template;
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use portal_auth::session::trusted_device_token;
use portal_auth::{AuthError, LoginAttempt};
use portal_models::{AdminSessionStatus, LoginForm, LogoutForm};
use std::sync::Arc;
use tracing::error;

use crate::error::ApiError;
use crate::middleware::CurrentSession;
use crate::AppState;

// ============================================================================
// TEMPLATES
// ============================================================================

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: String,
    has_error: bool,
    remember_days: i64,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    device_trusted: bool,
}

pub fn render_login(state: &AppState, status: StatusCode, error_message: Option<&str>) -> Response {
    let template = LoginTemplate {
        error: error_message.unwrap_or_default().to_string(),
        has_error: error_message.is_some(),
        remember_days: state.config.auth.trusted_device_ttl.num_days(),
    };

    let body = Html(template.render().unwrap_or_else(|e| {
        error!("Template render error: {}", e);
        "Error rendering page".to_string()
    }));
    (status, body).into_response()
}

/// Redirect with any number of `Set-Cookie` headers attached.
fn redirect_with_cookies(to: &str, cookies: Vec<String>) -> Response {
    let mut response = Redirect::to(to).into_response();
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!("Dropping malformed Set-Cookie value: {}", e),
        }
    }
    response
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /admin/login
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    if current.is_admin() {
        return Redirect::to("/admin/dashboard").into_response();
    }
    render_login(&state, StatusCode::OK, None)
}

/// POST /admin/login - Handle login form submission
pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let attempt = LoginAttempt {
        password: form.password,
        code: form.token,
        remember_device: form.remember_device,
        trusted_device_token: trusted_device_token(&headers),
        previous_session_id: current.id,
    };

    match state.auth.login(attempt).await {
        Ok(outcome) => Ok(redirect_with_cookies("/admin/dashboard", outcome.set_cookies)),
        // Same page and message whichever factor was wrong
        Err(AuthError::InvalidCredentials) => Ok(render_login(
            &state,
            StatusCode::UNAUTHORIZED,
            Some("Invalid credentials"),
        )),
        Err(e) => Err(e.into()),
    }
}

/// GET /admin/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    headers: HeaderMap,
) -> Response {
    if !current.is_admin() {
        return Redirect::to("/admin/login").into_response();
    }

    let device_trusted = match trusted_device_token(&headers) {
        Some(token) => state.auth.trusted_devices().is_trusted(&token).await,
        None => false,
    };
    let template = DashboardTemplate { device_trusted };

    Html(template.render().unwrap_or_else(|e| {
        error!("Template render error: {}", e);
        "Error rendering page".to_string()
    }))
    .into_response()
}

/// GET /admin/check and GET /api/admin-session
pub async fn session_status(
    Extension(current): Extension<CurrentSession>,
) -> Json<AdminSessionStatus> {
    Json(AdminSessionStatus {
        logged_in: current.is_admin(),
    })
}

/// POST /admin/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    headers: HeaderMap,
    Form(form): Form<LogoutForm>,
) -> Response {
    let token = trusted_device_token(&headers);
    let cookies = state
        .auth
        .logout(current.id.as_deref(), token.as_deref(), form.forget_device)
        .await;

    redirect_with_cookies("/admin/login", cookies)
}

/// GET /html/school/admin.html - the old static page now lives behind the session
pub async fn legacy_admin_page() -> Redirect {
    Redirect::to("/admin/login")
}
