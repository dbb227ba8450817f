//! Request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every request
//! - Decode book fields from JSON or url-encoded bodies
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Unsupported or missing content types yield an empty field set, which
//!   then fails validation rather than the request itself

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, StatusCode},
    Form,
};
use serde_json::Value;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::books::validation::RawFields;
use crate::http::response::ApiError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Issues UUID v4 request IDs.
#[derive(Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request body fields, whatever encoding they arrived in.
#[derive(Debug, Default)]
pub struct BodyFields(pub RawFields);

#[derive(Debug, PartialEq, Eq)]
enum BodyKind {
    Json,
    UrlEncoded,
    Other,
}

fn body_kind(request: &Request) -> BodyKind {
    let mime = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if mime == "application/json" || mime.ends_with("+json") {
        BodyKind::Json
    } else if mime == "application/x-www-form-urlencoded" {
        BodyKind::UrlEncoded
    } else {
        BodyKind::Other
    }
}

fn rejection(status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(text)
    }
}

fn parse_json(bytes: &[u8]) -> Result<RawFields, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(RawFields::new());
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Array(_)) => Ok(RawFields::new()),
        Ok(_) => Err(ApiError::BadRequest(
            "JSON body must be an object".to_string(),
        )),
        Err(e) => Err(ApiError::BadRequest(format!("Malformed JSON body: {e}"))),
    }
}

impl<S> FromRequest<S> for BodyFields
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match body_kind(&request) {
            BodyKind::Json => {
                let bytes = Bytes::from_request(request, state)
                    .await
                    .map_err(|e| rejection(e.status(), e.body_text()))?;
                parse_json(&bytes).map(BodyFields)
            }
            BodyKind::UrlEncoded => {
                let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, state)
                    .await
                    .map_err(|e| rejection(e.status(), e.body_text()))?;
                let fields = pairs
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect();
                Ok(BodyFields(fields))
            }
            BodyKind::Other => Ok(BodyFields::default()),
        }
    }
}
