// crates/backend-lib/src/middleware/mod.rs

//! Request middleware and extractors.

pub mod authenticate;
pub mod rate_limit;

pub use authenticate::{request_credential, MaybePrincipal};
pub use rate_limit::{prune_expired, rate_limit, RateLimitEntry};

use axum::http::HeaderMap;

/// Client address as reported by the fronting proxy
pub fn client_address(headers: &HeaderMap) -> String {
    let real_ip = headers.get("x-real-ip").and_then(|h| h.to_str().ok());
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|list| list.split(',').next());

    real_ip
        .or(forwarded)
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests;
