//! HTTP error type and its JSON envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use ats_core::{CandidateError, FieldErrors};

pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON in request body";
pub const DOCUMENT_REQUIRED_MESSAGE: &str = "Document is required";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Candidate(#[from] CandidateError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Route not found")]
    RouteNotFound,

    #[error("Too many requests")]
    RateLimited,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("{0}")]
    Internal(String),
}

/// `{success: false, message, error, fieldErrors?}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
}

impl ApiError {
    pub fn invalid_json() -> Self {
        ApiError::BadRequest(INVALID_JSON_MESSAGE.to_string())
    }

    pub fn document_required() -> Self {
        ApiError::BadRequest(DOCUMENT_REQUIRED_MESSAGE.to_string())
    }

    /// Map a body extraction failure. Size limit breaches keep their 413.
    pub fn body_rejection(status: StatusCode, detail: impl Into<String>) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(detail.into())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Candidate(err) => match err {
                CandidateError::ValidationFailed(_)
                | CandidateError::UnknownFieldRejected(_)
                | CandidateError::DuplicateDocument
                | CandidateError::DuplicateEmail => StatusCode::BAD_REQUEST,
                CandidateError::NotFound(_) | CandidateError::NoAttachment(_) => {
                    StatusCode::NOT_FOUND
                }
                CandidateError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the envelope. Internal details never reach the client.
    pub fn body(&self) -> ErrorBody {
        let (message, error) = match self {
            ApiError::Candidate(err) => match err {
                CandidateError::ValidationFailed(_) => ("Invalid input data", "Validation failed"),
                CandidateError::UnknownFieldRejected(_) => {
                    ("Invalid input data", "Field not allowed")
                }
                CandidateError::DuplicateDocument => {
                    (ats_core::service::DUPLICATE_DOCUMENT_MESSAGE, "Duplicate document")
                }
                CandidateError::DuplicateEmail => {
                    (ats_core::service::DUPLICATE_EMAIL_MESSAGE, "Duplicate email")
                }
                CandidateError::NotFound(_) => ("Candidate not found", "Candidate not found"),
                CandidateError::NoAttachment(_) => ("Candidate has no CV", "CV not found"),
                CandidateError::PersistenceFailure(_) => {
                    ("Internal server error", "Internal error")
                }
            },
            ApiError::BadRequest(msg) => {
                return ErrorBody {
                    success: false,
                    message: msg.clone(),
                    error: "Bad request".to_string(),
                    field_errors: None,
                }
            }
            ApiError::RouteNotFound => ("Route not found", "Not found"),
            ApiError::RateLimited => (
                "Too many requests, please try again later",
                "rate_limit_exceeded",
            ),
            ApiError::PayloadTooLarge => ("Request body too large", "Payload too large"),
            ApiError::Internal(_) => ("Internal server error", "Internal error"),
        };

        let field_errors = match self {
            ApiError::Candidate(err) => err.field_errors(),
            _ => None,
        };

        ErrorBody {
            success: false,
            message: message.to_string(),
            error: error.to_string(),
            field_errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(subsystem = "api", error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
