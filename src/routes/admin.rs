use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Submission, SubmissionStatus};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct UpdateStatus {
    pub status: SubmissionStatus,
}

/// Stand-in for the downstream processing that moves a payment along.
pub async fn update_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatus>,
) -> Result<Json<Submission>, AppError> {
    let submission = state
        .submissions
        .update_status(id, req.status)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

    tracing::info!(
        "Submission {} moved to {}",
        submission.id,
        submission.status.as_str()
    );
    Ok(Json(submission))
}
