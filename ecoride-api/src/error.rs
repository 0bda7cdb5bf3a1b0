use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ecoride_core::{CoreError, WindowViolation};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_body(&self) -> (StatusCode, Value) {
        let message = self.to_string();
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, json!({ "error": message })),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, json!({ "error": message })),
            AppError::Core(err) => core_response(err),
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
        }
    }
}

fn core_response(err: &CoreError) -> (StatusCode, Value) {
    let message = err.to_string();
    match err {
        CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, json!({ "error": message })),
        CoreError::Unauthorized(_) => (StatusCode::FORBIDDEN, json!({ "error": message })),
        CoreError::InvalidState(_)
        | CoreError::DuplicateBooking { .. }
        | CoreError::AlreadyUsed => (StatusCode::CONFLICT, json!({ "error": message })),
        CoreError::CapacityExceeded { requested, available } => (
            StatusCode::CONFLICT,
            json!({ "error": message, "requested": requested, "available": available }),
        ),
        CoreError::OutOfWindow(WindowViolation::TooEarly { minutes_remaining }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": message, "minutes_remaining": minutes_remaining }),
        ),
        CoreError::OutOfWindow(WindowViolation::TooLate) => {
            (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": message }))
        }
        CoreError::OutOfRange { distance_m, limit_m, .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": message, "distance_m": distance_m.round(), "limit_m": limit_m }),
        ),
        CoreError::NoOp => (StatusCode::BAD_REQUEST, json!({ "error": message })),
        CoreError::Validation(details) => {
            (StatusCode::BAD_REQUEST, json!({ "error": "Validation failed", "details": details }))
        }
        CoreError::Storage(e) => {
            tracing::error!("Storage failure: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}
