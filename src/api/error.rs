use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use super::types::ErrorResponse;
use crate::error::{ErrorKind, InferenceError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Body was not valid JSON or did not match the request schema.
    #[error("{0}")]
    Body(#[from] JsonRejection),

    /// The blocking generation task panicked or was cancelled.
    #[error("Generation task failed: {0}")]
    Worker(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Inference(e) => match e.kind() {
                ErrorKind::Client => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Generation => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Body(rejection) => rejection.status(),
            ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            ApiError::Body(rejection) => rejection.body_text(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            error!("Request failed: {}", detail);
        }

        (status, Json(ErrorResponse { detail })).into_response()
    }
}
