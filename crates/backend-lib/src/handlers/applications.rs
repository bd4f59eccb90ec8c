//! Super-admin review of teacher applications.
use std::sync::Arc;
use axum::{
    extract::{Path, State},
    Json,
};
use tutorhub_common::{ApplicationReviewRequest, ApplicationReviewResponse, UserId};
use crate::auth::Principal;
use crate::{error::AppError, AppState};

/// `PATCH /teacher-applications/{id}`
pub async fn review(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(user_id): Path<UserId>,
    Json(body): Json<ApplicationReviewRequest>,
) -> Result<Json<ApplicationReviewResponse>, AppError> {
    let teacher = state
        .auth
        .review_application(&principal, user_id, body.status)
        .await?;

    Ok(Json(ApplicationReviewResponse {
        message: "Teacher application status updated.".to_string(),
        accepted: teacher.accepted,
        user: teacher.profile(),
    }))
}
