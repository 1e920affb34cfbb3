use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracelens_core::EngineError;

/// Engine error carried out of a handler; rendered as the contract's
/// `{"message": ...}` JSON body with the matching status.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            EngineError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            EngineError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            EngineError::Cancelled(m) => (StatusCode::GATEWAY_TIMEOUT, m.clone()),
            EngineError::Internal(m) => {
                // Logged server-side; the caller only learns that we failed.
                tracing::error!(error = %m, "internal error while serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
