//! Error taxonomy shared by every component, plus its JSON rendering at the
//! HTTP boundary (`{kind, message}`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    AlreadyFinalized(String),

    /// The actor is known but its role does not allow the operation.
    #[error("{0}")]
    Unauthorized(String),

    /// No usable identity was supplied with the request.
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    InvalidTemplate(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound { entity, id: id.into() }
    }

    /// Name reported to clients in the `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound { .. } => "NotFound",
            ServiceError::Validation(_) => "ValidationError",
            ServiceError::InvalidState(_) => "InvalidState",
            ServiceError::AlreadyFinalized(_) => "AlreadyFinalized",
            ServiceError::Unauthorized(_) | ServiceError::Unauthenticated(_) => "Unauthorized",
            ServiceError::InvalidTemplate(_) => "InvalidTemplate",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) | ServiceError::InvalidTemplate(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::InvalidState(_) | ServiceError::AlreadyFinalized(_) => {
                StatusCode::CONFLICT
            }
            ServiceError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ServiceError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub kind: &'static str,
    pub message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ServiceError::InvalidTemplate(msg) = &self {
            warn!(target: "cotw_backend", error = %msg, "Grading invariant violated");
        }
        let body = ErrorOut { kind: self.kind(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}
