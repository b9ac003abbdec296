use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;

use crate::{engine::QuizEngine, error::AppError, utils::jwt::Claims};

/// Whether the caller currently holds a valid pass, and for how many days.
pub async fn check_qualification(
    State(engine): State<Arc<QuizEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let candidate_id = claims.candidate_id()?;
    let qualification = engine
        .qualification(candidate_id, Utc::now())
        .await?;
    Ok(Json(qualification))
}
