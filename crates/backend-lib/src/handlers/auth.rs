// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! Auth endpoints. Every credential travels both in the JSON body and as an
//! httpOnly cookie.
use std::sync::Arc;
use axum::{extract::State, http::HeaderMap, Json};
use axum_extra::extract::cookie::CookieJar;
use tutorhub_common::{
    AuthResponse, EmailRequest, LoginRequest, LogoutResponse, MessageResponse,
    OtpVerifiedResponse, ResetPasswordRequest, UserProfile, VerifyOtpRequest,
};
use crate::auth::{Principal, SessionGrant, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::middleware::{client_address, request_credential, MaybePrincipal};
use crate::{error::AppError, AppState};

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name).map(|cookie| cookie.value().to_string())
}

fn session_response(grant: SessionGrant) -> (CookieJar, Json<AuthResponse>) {
    let mut jar = CookieJar::new().add(grant.access.cookie);
    if let Some(refresh) = grant.refresh {
        jar = jar.add(refresh.cookie);
    }
    let body = AuthResponse {
        profile: grant.user.profile(),
        token: grant.access.plaintext,
    };
    (jar, Json(body))
}

/// `POST auth/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let client = client_address(&headers);
    let grant = state.auth.login(&body, &client).await?;
    Ok(session_response(grant))
}

/// `GET auth/refresh`
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let presented = cookie_value(&jar, REFRESH_COOKIE);
    let grant = state.auth.refresh(presented.as_deref()).await?;
    Ok(session_response(grant))
}

/// `DELETE auth/logout`
pub async fn logout(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    let access = cookie_value(&jar, ACCESS_COOKIE);
    let refresh = cookie_value(&jar, REFRESH_COOKIE);

    state
        .auth
        .logout(principal.as_ref(), access.as_deref(), refresh.as_deref())
        .await;

    let jar = CookieJar::new()
        .add(state.sessions.forget(ACCESS_COOKIE))
        .add(state.sessions.forget(REFRESH_COOKIE));
    let body = LogoutResponse {
        success: true,
        message: "Logged out and tokens expired".to_string(),
    };
    (jar, Json(body))
}

/// `POST auth/forgot-password`
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.forgot_password(&body.email).await?;
    Ok(Json(MessageResponse::new("email sent")))
}

/// `POST auth/resend-otp`
pub async fn resend_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.resend_otp(&body.email).await?;
    Ok(Json(MessageResponse::new("email sent")))
}

/// `POST auth/verify-otp`
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<(CookieJar, Json<OtpVerifiedResponse>), AppError> {
    let issued = state.auth.verify_otp(&body.otp).await?;

    let jar = CookieJar::new().add(issued.cookie);
    let body = OtpVerifiedResponse {
        message: "Valid OTP".to_string(),
        token: issued.plaintext,
    };
    Ok((jar, Json(body)))
}

/// `POST auth/reset-password`
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let credential = request_credential(&headers);
    state
        .auth
        .reset_password(credential.as_deref(), &body)
        .await?;

    let jar = CookieJar::new().add(state.sessions.forget(ACCESS_COOKIE));
    Ok((jar, Json(MessageResponse::new("Password reset successfully"))))
}

/// `GET auth/me`
pub async fn me(principal: Principal) -> Json<UserProfile> {
    Json(principal.user.profile())
}
