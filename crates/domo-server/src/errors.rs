//! HTTP error responses.
//!
//! Every failing route answers with
//! `{"error": {"code": "...", "message": "..."}}` and the matching status.

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domo_assistant::AssistantError;
use domo_store::StoreError;
use serde::Serialize;
use tracing::{error, warn};

use crate::websocket::broadcast::BroadcastError;

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed body, query, or upload.
    #[error("{0}")]
    InvalidInput(String),

    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The live subscriber limit is reached.
    #[error("{0}")]
    AtCapacity(String),

    /// A collaborator is not configured.
    #[error("{0}")]
    NotAvailable(String),

    /// The device store failed.
    #[error("{0}")]
    Storage(String),

    /// A collaborator failed.
    #[error("{0}")]
    Service(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
}

impl ApiError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AtCapacity(_) => "AT_CAPACITY",
            Self::NotAvailable(_) => "NOT_AVAILABLE",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Service(_) => "SERVICE_ERROR",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AtCapacity(_) | Self::NotAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Service(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::InvalidInput(e.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(format!("device {id} not found")),
            other => {
                error!(error = %other, "device store failure");
                Self::Storage("device store unavailable".into())
            }
        }
    }
}

impl From<AssistantError> for ApiError {
    fn from(e: AssistantError) -> Self {
        if e.is_rejection() {
            warn!(error = %e, "collaborator rejected input");
            Self::InvalidInput(e.to_string())
        } else {
            error!(error = %e, "collaborator failure");
            Self::Service(e.to_string())
        }
    }
}

impl From<BroadcastError> for ApiError {
    fn from(e: BroadcastError) -> Self {
        Self::AtCapacity(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn invalid_input_shape() {
        let (status, body) = body_json(ApiError::InvalidInput("value must be an integer".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
        assert_eq!(body["error"]["message"], "value must be an integer");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::NotFound(String::new()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::AtCapacity(String::new()).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::NotAvailable(String::new()).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::Storage(String::new()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::Service(String::new()).status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn store_not_found_maps_to_404() {
        let err = ApiError::from(StoreError::NotFound(7));
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.to_string(), "device 7 not found");
    }

    #[test]
    fn assistant_rejection_is_client_error() {
        let err = ApiError::from(AssistantError::Status {
            service: "face",
            status: 400,
            body: "no face".into(),
        });
        assert_eq!(err.code(), "INVALID_INPUT");

        let err = ApiError::from(AssistantError::EmptyReply);
        assert_eq!(err.code(), "SERVICE_ERROR");
    }

    #[test]
    fn capacity_maps_to_503() {
        let err = ApiError::from(BroadcastError::AtCapacity { max: 3 });
        assert_eq!(err.code(), "AT_CAPACITY");
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
