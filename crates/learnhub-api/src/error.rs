use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use learnhub_core::LearnHubError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] LearnHubError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Core(ref err) => match err {
                LearnHubError::Upstream(_) | LearnHubError::TerminalRun(_) => {
                    (StatusCode::BAD_GATEWAY, self.to_string())
                }
                LearnHubError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
                LearnHubError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
