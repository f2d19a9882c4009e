//! Integration tests for the cross-site request guard on admin form posts.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{body_json, build_test_app, HOST, PASSWORD};

fn post(path: &str, extra: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::HOST, HOST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    for (name, value) in extra {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from("password=nope&token=000000")).unwrap()
}

#[tokio::test]
async fn foreign_origin_is_forbidden() {
    let app = build_test_app();

    let response = app
        .send(post("/admin/login", &[("origin", "https://evil.test")]))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Bad Origin");
}

#[tokio::test]
async fn foreign_referer_is_forbidden() {
    let app = build_test_app();

    let response = app
        .send(post("/admin/login", &[("referer", "https://evil.test/phish")]))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Bad Referer");
}

#[tokio::test]
async fn missing_origin_signals_are_forbidden() {
    let app = build_test_app();

    let response = app.send(post("/admin/login", &[])).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Origin required");
}

#[tokio::test]
async fn same_origin_signals_reach_the_handler() {
    let app = build_test_app();

    for extra in [
        vec![("origin", "http://admin.test")],
        vec![("referer", "http://admin.test/admin/login")],
        vec![("sec-fetch-site", "same-origin")],
        vec![("sec-fetch-mode", "navigate"), ("sec-fetch-dest", "document")],
        vec![("origin", "https://martinlutheroshkosh.com")],
    ] {
        let response = app.send(post("/admin/login", &extra)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{:?}", extra);
    }
}

#[tokio::test]
async fn rejected_origin_does_not_spend_the_attempt_budget() {
    let app = build_test_app();

    for _ in 0..10 {
        app.send(post("/admin/login", &[("origin", "https://evil.test")]))
            .await;
    }

    let code = app.code();
    let request = Request::builder()
        .method("POST")
        .uri("/admin/login")
        .header(header::HOST, HOST)
        .header(header::ORIGIN, "http://admin.test")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "password={}&token={}",
            PASSWORD.replace(' ', "+"),
            code
        )))
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn logout_is_guarded_too() {
    let app = build_test_app();

    let response = app
        .send(post("/admin/logout", &[("origin", "https://evil.test")]))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reads_are_not_guarded() {
    let app = build_test_app();

    let request = Request::builder()
        .uri("/admin/check")
        .header(header::HOST, HOST)
        .header(header::ORIGIN, "https://evil.test")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::OK);
}
