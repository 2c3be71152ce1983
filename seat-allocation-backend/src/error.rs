use std::convert::Infallible;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use http_body_util::Full;
use seat_allocation_config::ConfigError;
use seat_allocation_database::DatabaseError;
use seat_allocation_optimizer::ValidationError;
use serde::Serialize;
use tracing::error;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    /// Shown to the client without any detail so no partial result leaks.
    #[error("allocation failed, please retry")]
    AllocationFailed(#[source] DatabaseError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid request body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read request body: {0}")]
    Body(Box<dyn std::error::Error + Send + Sync>),
    #[error("request body is larger than {0} bytes")]
    PayloadTooLarge(usize),
    #[error("webserver error: {0}")]
    Hyper(#[from] hyper::Error),
    #[error("IO error: {0}")]
    File(#[from] std::io::Error),
    #[error("missing or wrong admin token")]
    Unauthorized,
    #[error("no allocation has been published yet")]
    NoAllocation,
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
}

impl From<Infallible> for AppError {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Json(_) | Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NoAllocation | Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::AllocationFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Config(_) | Self::Hyper(_) | Self::File(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client errors carry their message, internal errors are logged and answered generically.
    #[must_use]
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "internal server error".to_owned()
        } else {
            self.to_string()
        };
        let body = serde_json::to_vec(&ErrorBody { error: message }).unwrap_or_default();
        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use seat_allocation_optimizer::SeatId;

    use super::*;

    async fn body(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_errors_keep_their_reason() {
        let response =
            AppError::from(ValidationError::UnknownSeat(SeatId::from("group-9/row-1")))
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(response).await["error"],
            "unknown seat group-9/row-1"
        );
    }

    #[tokio::test]
    async fn internal_errors_are_generic() {
        let response =
            AppError::Database(DatabaseError::Database(diesel::result::Error::NotFound))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(response).await["error"], "internal server error");
    }
}
