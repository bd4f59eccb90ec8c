use axum::Json;
use chrono::Utc;
use tutorhub_common::HealthResponse;

/// Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
    })
}
