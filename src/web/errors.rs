use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::application::dto::ErrorResponse;
use crate::domain::BankingError;

pub fn status_for(error: &BankingError) -> StatusCode {
    match error {
        BankingError::NotFound(_) => StatusCode::NOT_FOUND,
        BankingError::Validation(_) => StatusCode::BAD_REQUEST,
        BankingError::Conflict(_) => StatusCode::CONFLICT,
        BankingError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        BankingError::Transient(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for BankingError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// Extractor rejections are client mistakes; answer them in the usual error shape.
impl From<JsonRejection> for BankingError {
    fn from(rejection: JsonRejection) -> Self {
        BankingError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for BankingError {
    fn from(rejection: PathRejection) -> Self {
        BankingError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for BankingError {
    fn from(rejection: QueryRejection) -> Self {
        BankingError::validation(rejection.body_text())
    }
}
