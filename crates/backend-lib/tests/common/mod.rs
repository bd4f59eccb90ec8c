//! Shared setup for the HTTP-level tests.
#![allow(dead_code)]

use std::sync::Arc;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use tutorhub_backend::{
    auth::RecordingMailer,
    config::{PasswordHashing, SecretKey, Settings},
    create_router,
    storage::FlatFileStorage,
    AppState,
};
use tutorhub_common::Role;

pub const PASSWORD: &str = "secret123";

/// A running app over flat-file storage in a temporary directory
pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    pub mailer: RecordingMailer,
    /// Keep in scope so the data directory outlives the test
    pub dir: TempDir,
}

pub fn test_settings(dir: &TempDir) -> Settings {
    Settings {
        data_dir: dir.path().to_path_buf(),
        token_secret: SecretKey::new("integration-test-secret"),
        password_hashing: PasswordHashing { log_n: 4, r: 8, p: 1 },
        ..Settings::default()
    }
}

/// Build an app over `dir`, reusing whatever is stored there
pub fn open_app(dir: TempDir) -> TestApp {
    let mailer = RecordingMailer::new();
    let storage = FlatFileStorage::new(dir.path()).unwrap();
    let state = Arc::new(
        AppState::new(storage, test_settings(&dir), Arc::new(mailer.clone()))
            .expect("Failed to create AppState for test"),
    );
    TestApp {
        router: create_router(state.clone()),
        state,
        mailer,
        dir,
    }
}

pub fn setup_test_env() -> TestApp {
    open_app(TempDir::new().unwrap())
}

impl TestApp {
    pub async fn user(&self, email: &str, role: Role) {
        self.state
            .create_user("Test User", email, PASSWORD, role)
            .await
            .unwrap();
    }

    /// Send a request, returning status, headers and the JSON body (Null when empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    pub async fn login(&self, email: &str, password: &str, remember: bool) -> (StatusCode, HeaderMap, Value) {
        self.send(json_request(
            Method::POST,
            "/api/v1/auth/login",
            serde_json::json!({ "email": email, "password": password, "remember": remember }),
        ))
        .await
    }

    /// Log in and return the access token
    pub async fn token_for(&self, email: &str) -> String {
        let (status, _, body) = self.login(email, PASSWORD, false).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-real-ip", "127.0.0.1")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-real-ip", "127.0.0.1")
        .body(Body::empty())
        .unwrap()
}

/// `Set-Cookie` header for `name`, if the response set one
pub fn set_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&prefix))
        .map(str::to_string)
}

/// The value carried by a `Set-Cookie` header
pub fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}
