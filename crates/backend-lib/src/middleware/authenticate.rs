//! Bearer credential extraction.
//!
//! The `Authorization: Bearer` header wins; the `token` cookie is the
//! fallback for browser clients.
use std::sync::Arc;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use crate::auth::{Principal, ACCESS_COOKIE};
use crate::{error::AppError, AppState};

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim().to_string())
}

/// Credential presented with a request, if any
pub fn request_credential(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers)
        .filter(|token| !token.is_empty())
        .or_else(|| {
            CookieJar::from_headers(headers)
                .get(ACCESS_COOKIE)
                .map(|cookie| cookie.value().to_string())
        })
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<Arc<AppState>> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let credential = request_credential(&parts.headers).ok_or(AppError::Unauthenticated)?;
        state.auth.authenticate(&credential).await
    }
}

/// Caller identity for routes that also serve anonymous requests
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

impl FromRequestParts<Arc<AppState>> for MaybePrincipal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(credential) = request_credential(&parts.headers) else {
            return Ok(Self(None));
        };
        match state.auth.authenticate(&credential).await {
            Ok(principal) => Ok(Self(Some(principal))),
            Err(AppError::Unauthenticated) => Ok(Self(None)),
            Err(e) => {
                tracing::warn!(error = %e, "could not resolve caller");
                Ok(Self(None))
            },
        }
    }
}
