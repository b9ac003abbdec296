// src/handlers/stats.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    engine::{QuizEngine, stats::DEFAULT_FAILED_LIMIT},
    error::AppError,
    models::stats::FailedListParams,
};

/// Answer distribution per question, the most often wrongly answered first.
pub async fn answer_stats(
    State(engine): State<Arc<QuizEngine>>,
) -> Result<impl IntoResponse, AppError> {
    let stats = engine.answer_statistics().await.map_err(|e| {
        tracing::error!("Failed to collect answer statistics: {:?}", e);
        AppError::from(e)
    })?;
    Ok(Json(stats))
}

pub async fn attempt_stats(
    State(engine): State<Arc<QuizEngine>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(engine.attempt_statistics().await?))
}

/// Candidates who failed and never passed, newest first.
pub async fn failed_candidates(
    State(engine): State<Arc<QuizEngine>>,
    Query(params): Query<FailedListParams>,
) -> Result<impl IntoResponse, AppError> {
    params
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let limit = params.limit.unwrap_or(DEFAULT_FAILED_LIMIT);
    Ok(Json(engine.failed_candidates(limit).await?))
}
