// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    engine::QuizEngine,
    error::AppError,
    models::attempt::{AttemptSummary, BeginRequest, SubmitAnswerRequest},
    utils::jwt::Claims,
};

/// Availability of the quiz, the latest attempt and the candidate's qualification.
pub async fn status(
    State(engine): State<Arc<QuizEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let candidate_id = claims.candidate_id()?;
    let status = engine.status(candidate_id, Utc::now()).await?;
    Ok(Json(status))
}

/// Starts the quiz or continues the current attempt.
///
/// Answers 201 when a new attempt was created and 200 when an existing one is returned.
pub async fn begin(
    State(engine): State<Arc<QuizEngine>>,
    Extension(claims): Extension<Claims>,
    payload: Option<Json<BeginRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let candidate_id = claims.candidate_id()?;
    let Json(req) = payload.unwrap_or_default();

    let mut rng = StdRng::from_os_rng();
    let (attempt, created) = engine
        .begin(candidate_id, req.restart, Utc::now(), &mut rng)
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(serde_json::json!({
            "created": created,
            "attempt": AttemptSummary::from(&attempt),
        })),
    ))
}

pub async fn current_question(
    State(engine): State<Arc<QuizEngine>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let candidate_id = claims.candidate_id()?;
    let mut rng = StdRng::from_os_rng();
    let question = engine
        .current_question(candidate_id, attempt_id, Utc::now(), &mut rng)
        .await?;
    Ok(Json(question))
}

/// Shows another question without answering the current one.
pub async fn skip(
    State(engine): State<Arc<QuizEngine>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let candidate_id = claims.candidate_id()?;
    let mut rng = StdRng::from_os_rng();
    let question = engine
        .skip(candidate_id, attempt_id, Utc::now(), &mut rng)
        .await?;
    Ok(Json(question))
}

/// Records an answer for the current question.
///
/// * A choice other than A, B, C or D, or no body at all, skips the question.
/// * The response holds either the next question or the final result.
pub async fn submit_answer(
    State(engine): State<Arc<QuizEngine>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    payload: Option<Json<SubmitAnswerRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.unwrap_or_default();

    let candidate_id = claims.candidate_id()?;
    let mut rng = StdRng::from_os_rng();
    let outcome = engine
        .record_answer(
            candidate_id,
            attempt_id,
            payload.choice.as_deref(),
            payload.slot_id,
            Utc::now(),
            &mut rng,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn get_result(
    State(engine): State<Arc<QuizEngine>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let candidate_id = claims.candidate_id()?;
    let result = engine.result(candidate_id, attempt_id, Utc::now()).await?;
    Ok(Json(result))
}
