use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use super::rest::Rest;
use crate::infrastructure::db::DataError;

/// Failure at the HTTP boundary, rendered as an envelope.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("validation failed")]
    Validation(Value),
    #[error("{message}")]
    Http {
        status: StatusCode,
        message: String,
        errors: Option<Value>,
    },
    #[error(transparent)]
    Data(#[from] DataError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Http { status, .. } => *status,
            AppError::Data(DataError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Data(DataError::Configuration(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Data(DataError::Persistence(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = match self {
            AppError::NotFound(what) => Rest::error(
                status,
                "resource not found",
                "RESOURCE_NOT_FOUND",
                format!("{what} does not exist"),
            ),
            AppError::Validation(detail) => {
                tracing::warn!(detail = %detail, "request_validation_failed");
                Rest::error(status, "unprocessable entity", "UNPROCESSABLE", detail)
            }
            AppError::Http {
                message, errors, ..
            } => Rest::format(status, Some(message), None, errors),
            AppError::Data(DataError::Validation(e)) => {
                tracing::warn!(error = %e, "data_validation_failed");
                Rest::error(status, "unprocessable entity", "UNPROCESSABLE", e.to_string())
            }
            AppError::Data(DataError::Configuration(e)) => {
                tracing::error!(error = ?e, "database_unavailable");
                Rest::error(
                    status,
                    "database unavailable",
                    "DATABASE_UNAVAILABLE",
                    "the database layer is not available",
                )
            }
            AppError::Data(DataError::Persistence(e)) => {
                tracing::error!(error = ?e, "persistence_failed");
                internal_error()
            }
        };
        envelope.into_response()
    }
}

pub(crate) fn internal_error() -> super::rest::Envelope {
    Rest::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error",
        "INTERNAL_SERVER_ERROR",
        "an unexpected error occurred on the server; try again later or contact support if the problem persists",
    )
}
