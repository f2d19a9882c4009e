use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use portal_auth::session::SESSION_COOKIE;
use portal_models::SessionData;
use std::sync::Arc;

/// The session, if any, attached to the current request.
#[derive(Debug, Clone, Default)]
pub struct CurrentSession {
    /// Id decrypted from the cookie, even when no live session backs it.
    pub id: Option<String>,
    pub data: Option<SessionData>,
}

impl CurrentSession {
    pub fn is_admin(&self) -> bool {
        self.data
            .as_ref()
            .is_some_and(SessionData::is_authenticated_admin)
    }
}

/// Loads the session behind `ml.sid` and slides its inactivity window
/// forward. Storage errors leave the request anonymous.
pub async fn load_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let sessions = state.auth.sessions();
    let id = sessions.session_id_from_headers(request.headers());

    let mut data = None;
    if let Some(id) = id.as_deref() {
        match sessions.load(id).await {
            Ok(loaded) => data = loaded,
            Err(e) => tracing::warn!("Session lookup failed, treating as anonymous: {}", e),
        }
    }

    let mut refreshed_cookie = None;
    if let (Some(id), Some(session)) = (id.as_deref(), data.as_mut()) {
        if session.is_authenticated_admin() {
            match sessions.touch(id, session).await {
                Ok(()) => refreshed_cookie = sessions.session_cookie(id).ok(),
                Err(e) => tracing::warn!("Failed to extend session: {}", e),
            }
        }
    }

    request.extensions_mut().insert(CurrentSession { id, data });
    let mut response = next.run(request).await;

    // Handlers that issue or clear the session set their own cookie, and
    // error responses carry none
    let status = response.status();
    if let Some(cookie) = refreshed_cookie {
        if (status.is_success() || status.is_redirection()) && !sets_session_cookie(&response) {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
    }

    response
}

fn sets_session_cookie(response: &Response) -> bool {
    let prefix = format!("{}=", SESSION_COOKIE);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}
