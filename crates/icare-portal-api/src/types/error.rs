//! API errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use icare_portal::IcareError;

/// All errors a REST handler can return.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// The request itself could not be read (bad JSON, missing parameter).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Portal(#[from] IcareError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Portal(e) => match e {
                IcareError::InvalidQuery(_) | IcareError::InvalidDetailUrl(_) => {
                    StatusCode::BAD_REQUEST
                }
                IcareError::TaxDataUnavailable => StatusCode::NOT_FOUND,
                IcareError::PortalError { .. } | IcareError::MalformedPortalPage(_) => {
                    StatusCode::BAD_GATEWAY
                }
                IcareError::PortalUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    /// Machine-readable error code carried in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Portal(e) => e.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), error = %self, "request failed upstream");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }

        let body = serde_json::json!({
            "success": false,
            "code": self.code(),
            "detail": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
