//! Route handlers for `/books`.

use axum::{
    extract::{FromRequest, Request, State},
    response::{IntoResponse, Response},
    Json,
};

use crate::books::model::{BookRecord, Status};
use crate::books::validation::{validate_book, RawFields};
use crate::http::request::BodyFields;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

/// `GET /books`: every row, unfiltered.
pub async fn list_books(State(state): State<AppState>) -> Result<Json<Vec<BookRecord>>, ApiError> {
    let books = state.store.list_books().await?;
    tracing::debug!(count = books.len(), "Listed books");
    Ok(Json(books))
}

/// `POST /books`: decode the body, charge the write quota, validate, then insert.
///
/// A body that cannot be decoded is rejected before the quota is touched.
pub async fn add_book(State(state): State<AppState>, request: Request) -> Response {
    let client = state
        .write_limiter
        .as_ref()
        .map(|limiter| limiter.client_key(&request));

    let BodyFields(fields) = match BodyFields::from_request(request, &state).await {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };

    let decision = match (&state.write_limiter, client) {
        (Some(limiter), Some(client)) => {
            let decision = limiter.admit(&client);
            if !decision.allowed {
                return decision.rejection();
            }
            Some(decision)
        }
        _ => None,
    };

    let mut response = insert_book(&state, &fields).await.into_response();
    if let Some(decision) = decision {
        decision.write_headers(response.headers_mut());
    }
    response
}

async fn insert_book(state: &AppState, fields: &RawFields) -> Result<Json<Status>, ApiError> {
    let book = validate_book(fields).map_err(|errors| {
        tracing::info!(errors = errors.len(), "Rejected invalid book");
        ApiError::Validation(errors)
    })?;

    state.store.insert_book(&book).await?;
    metrics::record_book_inserted();
    tracing::info!(author = %book.author, title = %book.title, "Book added");

    Ok(Json(Status::book_added()))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
