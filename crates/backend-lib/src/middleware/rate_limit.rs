use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use super::client_address;
use crate::{error::AppError, AppState};

/// Per-client request budget over a fixed window
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let client_ip = client_address(request.headers());

    let max_requests = state.settings.rate_limit.max_requests;
    let window = Duration::from_secs(state.settings.rate_limit.window_secs);

    {
        let mut entry = state
            .rate_limits
            .entry(client_ip.clone())
            .or_insert_with(|| RateLimitEntry::new(0, Instant::now()));

        // Start a new window once the old one has passed
        if entry.window_start.elapsed() > window {
            entry.requests = 0;
            entry.window_start = Instant::now();
        }

        if entry.requests >= max_requests {
            tracing::debug!(client = %client_ip, "request budget exhausted");
            return Err(AppError::RateLimitExceeded);
        }

        entry.requests += 1;
    }

    Ok(next.run(request).await)
}

/// Drop clients whose window has run out; they start fresh on their next request
pub fn prune_expired(limits: &DashMap<String, RateLimitEntry>, window: Duration) -> usize {
    let before = limits.len();
    limits.retain(|_, entry| entry.window_start.elapsed() <= window);
    before - limits.len()
}

/// Rate limit entry for a client
#[derive(Debug)]
pub struct RateLimitEntry {
    requests: u32,
    window_start: Instant,
}

impl RateLimitEntry {
    pub fn new(requests: u32, window_start: Instant) -> Self {
        Self {
            requests,
            window_start,
        }
    }
}
