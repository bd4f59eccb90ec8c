use super::*;
use crate::auth::{LogMailer, Principal};
use crate::config::{PasswordHashing, RateLimitSettings, SecretKey, Settings};
use crate::storage::{MemoryStore, UserDirectory};
use crate::AppState;
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderValue, Request, StatusCode},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;
use tutorhub_common::Role;

async fn test_handler() -> &'static str {
    "Hello, World!"
}

async fn whoami(principal: Principal) -> String {
    principal.user.email
}

async fn maybe_whoami(MaybePrincipal(principal): MaybePrincipal) -> String {
    principal.map_or_else(|| "anonymous".to_string(), |p| p.user.email)
}

fn state(max_requests: u32) -> Arc<AppState> {
    let settings = Settings {
        token_secret: SecretKey::new("middleware-test-secret"),
        password_hashing: PasswordHashing { log_n: 4, r: 8, p: 1 },
        rate_limit: RateLimitSettings {
            window_secs: 60,
            max_requests,
        },
        ..Settings::default()
    };
    Arc::new(AppState::new(MemoryStore::new(), settings, Arc::new(LogMailer)).unwrap())
}

fn get_from(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-real-ip", ip)
        .body(Body::empty())
        .unwrap()
}

#[test]
fn test_client_address() {
    let mut headers = HeaderMap::new();
    assert_eq!(client_address(&headers), "unknown");

    headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.9, 10.0.0.1"));
    assert_eq!(client_address(&headers), "10.0.0.9");

    headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.4"));
    assert_eq!(client_address(&headers), "192.168.1.4");
}

#[test]
fn test_bearer_wins_over_cookie() {
    let mut headers = HeaderMap::new();
    assert_eq!(request_credential(&headers), None);

    headers.insert("cookie", HeaderValue::from_static("token=from-cookie; refresh=r"));
    assert_eq!(request_credential(&headers).as_deref(), Some("from-cookie"));

    headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
    assert_eq!(request_credential(&headers).as_deref(), Some("from-header"));

    // An empty bearer value falls back to the cookie
    headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
    assert_eq!(request_credential(&headers).as_deref(), Some("from-cookie"));
}

#[tokio::test]
async fn test_rate_limit() {
    let state = state(3);
    let app = Router::new()
        .route("/", get(test_handler))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .with_state(state);

    for _ in 0..3 {
        let response = app.clone().oneshot(get_from("/", "127.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Next request should be rate limited
    let response = app.clone().oneshot(get_from("/", "127.0.0.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Other clients have their own budget
    let response = app.oneshot(get_from("/", "127.0.0.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_principal_extractor() {
    let state = state(100);
    state
        .create_user("Ann", "a@x.com", "secret123", Role::Admin)
        .await
        .unwrap();
    let user = state.users.find_by_email("a@x.com").await.unwrap().unwrap();
    let issued = state
        .sessions
        .issue(
            &user,
            crate::storage::TokenKind::AccessToken,
            chrono::Utc::now() + chrono::Duration::days(1),
        )
        .await
        .unwrap();

    let app = Router::new()
        .route("/me", get(whoami))
        .route("/maybe", get(maybe_whoami))
        .with_state(state);

    let response = app.clone().oneshot(get_from("/me", "1.1.1.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/me")
        .header("cookie", format!("token={}", issued.plaintext))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .uri("/maybe")
        .header(AUTHORIZATION, "Bearer not-a-real-token")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"anonymous");
}
