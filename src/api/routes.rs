use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, Instrument};
use uuid::Uuid;

use super::error::ApiError;
use super::types::{HealthResponse, SelfTestResponse};
use super::AppState;
use crate::explainer::{explain, self_test, AnswerResponse, QuestionRequest};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/test", get(run_self_test))
        .route("/ask", post(ask))
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.generator.model_id().to_string(),
        device: state.device.clone(),
    })
}

/// GET /test: runs a canned question through the model.
async fn run_self_test(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SelfTestResponse>, ApiError> {
    let generator = Arc::clone(&state.generator);
    let report = tokio::task::spawn_blocking(move || self_test(generator.as_ref()))
        .await
        .map_err(|e| ApiError::Worker(e.to_string()))??;

    info!("Self-test answered: {} chars", report.response.len());
    Ok(Json(SelfTestResponse {
        status: "ok".to_string(),
        model: state.generator.model_id().to_string(),
        question: report.question,
        response: report.response,
    }))
}

/// POST /ask
///
/// ```bash
/// curl -X POST http://127.0.0.1:8000/ask \
///   -H 'content-type: application/json' \
///   -d '{"question":"Qual é 2+2?","options":["3","4","5"]}'
/// ```
async fn ask(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(request) = payload?;
    let span = tracing::info_span!("ask", request_id = %Uuid::new_v4());

    async move {
        info!(
            "Question with {} options, max_length={}, echo={}",
            request.options.len(),
            request.max_length,
            request.echo
        );

        // Generation is CPU/accelerator bound and holds the model lock.
        let generator = Arc::clone(&state.generator);
        let answer = tokio::task::spawn_blocking(move || explain(generator.as_ref(), &request))
            .await
            .map_err(|e| ApiError::Worker(e.to_string()))??;

        info!("Answered with {} chars", answer.generated_text.len());
        Ok(Json(answer))
    }
    .instrument(span)
    .await
}
