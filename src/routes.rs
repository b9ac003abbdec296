// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{qualification, quiz, stats},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Every route requires a bearer token; statistics also require the admin role.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (quiz engine and config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let quiz_routes = Router::new()
        .route("/status", get(quiz::status))
        .route("/begin", post(quiz::begin))
        .route("/attempts/{id}/question", get(quiz::current_question))
        .route("/attempts/{id}/skip", post(quiz::skip))
        .route("/attempts/{id}/answer", post(quiz::submit_answer))
        .route("/attempts/{id}/result", get(quiz::get_result))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let qualification_routes = Router::new()
        .route("/api/qualification", get(qualification::check_qualification))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/stats/answers", get(stats::answer_stats))
        .route("/stats/attempts", get(stats::attempt_stats))
        .route("/stats/failed", get(stats::failed_candidates))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/quiz", quiz_routes)
        .merge(qualification_routes)
        .nest("/api/admin/quiz", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
