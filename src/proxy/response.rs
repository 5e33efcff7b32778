//! Terminal response construction.
//!
//! Fixed responses written by stages that end a request without reaching the
//! dispatcher. Bodies are part of the wire contract and must not drift.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Body sent with admission rejections.
pub const TOO_MANY_REQUESTS_BODY: &str = "Too many requests, please try again later.";

/// Body sent when a resource request carries no Accept content type.
pub const NO_ACCEPT_CONTENT_TYPE_BODY: &str = "no accept content type is set.";

/// 429 with a retry hint; the request never reaches routing.
pub fn too_many_requests() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, "1")],
        TOO_MANY_REQUESTS_BODY,
    )
        .into_response()
}

/// 400 for failed content negotiation.
pub fn no_accept_content_type() -> Response {
    (StatusCode::BAD_REQUEST, NO_ACCEPT_CONTENT_TYPE_BODY).into_response()
}

/// 500 carrying the underlying error description.
pub fn internal_error(err: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Internal Server Error: {err}"),
    )
        .into_response()
}
