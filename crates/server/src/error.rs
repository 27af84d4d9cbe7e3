use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use mesero_core::errors::{ApplicationError, InterfaceError};

/// JSON error body. `detail` is only filled for client-side mistakes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn bad_request(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.into(),
        })
    }

    pub fn internal(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self(InterfaceError::Internal { message: message.into(), correlation_id: correlation_id.into() })
    }

    pub fn from_application(error: impl Into<ApplicationError>, correlation_id: &str) -> Self {
        Self(error.into().into_interface(correlation_id))
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let correlation_id = self.0.correlation_id().to_string();
        let detail = match &self.0 {
            InterfaceError::BadRequest { message, .. } | InterfaceError::Conflict { message, .. } => {
                Some(message.clone())
            }
            _ => None,
        };

        if status.is_server_error() {
            error!(
                event_name = "http.request.failed",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error = %self.0,
                "request failed"
            );
        } else {
            warn!(
                event_name = "http.request.rejected",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error = %self.0,
                "request rejected"
            );
        }

        let body = ErrorBody { error: self.0.user_message().to_string(), detail, correlation_id };
        (status, Json(body)).into_response()
    }
}
