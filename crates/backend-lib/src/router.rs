// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP router for the `/api/v1` surface.
use crate::handlers::{applications, auth, health};
use crate::middleware::rate_limit;
use crate::AppState;
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", delete(auth::logout))
        .route("/refresh", get(auth::refresh))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/reset-password", post(auth::reset_password))
        .route("/resend-otp", post(auth::resend_otp))
        .route("/me", get(auth::me));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .route("/health", get(health::health))
        .route("/teacher-applications/{id}", patch(applications::review))
        .layer(from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .nest("/api/v1", api)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cookies cross origins only with credentialed CORS, which rules out `*`;
/// the request origin is echoed back instead.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            ACCEPT,
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("x-xsrf-token"),
        ])
        .max_age(Duration::from_secs(86400))
}
