use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Field name -> messages, in the shape a form template would render them.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// A submitted form that failed validation, sent back so the client can
/// re-render it with the errors next to the fields.
#[derive(Debug, Serialize)]
pub struct FormRejection {
    pub form: serde_json::Value,
    pub errors: FieldErrors,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Form validation failed")]
    Validation(FormRejection),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn validation(form: impl Serialize, errors: FieldErrors) -> Self {
        let form = serde_json::to_value(form).unwrap_or(serde_json::Value::Null);
        AppError::Validation(FormRejection { form, errors })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
            AppError::PayloadTooLarge(message) => {
                (StatusCode::PAYLOAD_TOO_LARGE, message).into_response()
            }
            AppError::Validation(rejection) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(rejection)).into_response()
            }
            AppError::Database(e) => {
                error!(error = %e, "Database error while handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
            }
            AppError::Storage(e) => {
                error!(error = %e, "Image storage error while handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store image").into_response()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
