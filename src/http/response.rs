//! Error-to-response mapping.
//!
//! # Responsibilities
//! - Single place where failures become HTTP responses
//! - Structured JSON bodies for every error class
//! - Keep data-access details in the logs, never in the body

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::books::validation::FieldError;
use crate::store::StoreError;

/// Every failure a handler or middleware can surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed with {} error(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("not found")]
    NotFound,

    #[error("request timed out")]
    Timeout,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    message: &'a str,
}

#[derive(Serialize)]
struct ValidationBody<'a> {
    errors: &'a [FieldError],
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            status: "error",
            message,
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(errors) => {
                (status, Json(ValidationBody { errors: &errors })).into_response()
            }
            ApiError::BadRequest(message) => error_body(status, &message),
            ApiError::PayloadTooLarge => error_body(status, "Request body too large."),
            ApiError::RateLimited { retry_after_secs } => {
                let mut response =
                    error_body(status, "Too many requests, please try again later.");
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            ApiError::NotFound => error_body(status, "Not found."),
            ApiError::Timeout => error_body(status, "Request timed out."),
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Data access failed");
                error_body(status, "Internal server error.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_store_errors_hide_details() {
        let err = ApiError::from(StoreError::Unavailable("password=hunter2".into()));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Internal server error.");
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after_secs: 42 }.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[tokio::test]
    async fn test_validation_lists_errors() {
        let errors = crate::books::validation::validate_book(&serde_json::Map::new()).unwrap_err();
        let response = ApiError::Validation(errors).into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["errors"].as_array().unwrap().len(), 4);
        assert_eq!(body["errors"][0]["path"], "author");
    }
}
