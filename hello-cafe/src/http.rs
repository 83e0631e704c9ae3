// Copyright (C) 2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of hello-cafe.
//
// hello-cafe is free software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// hello-cafe is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with hello-cafe.  If not,
// see <http://www.gnu.org/licenses/>.

//! # hello-cafe HTTP plumbing
//!
//! Shared state, the error body every handler returns on failure, and assembly of the complete
//! [Router].

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tap::Pipe;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::info;

use crate::{admins, catalog::Catalog, items, sessions::Sessions};

/// A serializable struct for use in HTTP error responses
///
/// `code` is a stable, machine-readable name for the failure (e.g. "duplicate-item"); `error` is a
/// human-readable message. Internal failures are reported with code "internal" & a generic message;
/// the details go to the log, not the caller.
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponseBody {
    pub code: String,
    pub error: String,
}

impl ErrorResponseBody {
    pub fn new(code: &str, error: String) -> ErrorResponseBody {
        ErrorResponseBody {
            code: code.to_owned(),
            error,
        }
    }
}

impl IntoResponse for ErrorResponseBody {
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}

/// Render an error as a status code & [ErrorResponseBody]
pub fn error_response(status: StatusCode, code: &str, msg: String) -> axum::response::Response {
    (status, ErrorResponseBody::new(code, msg)).into_response()
}

/// An axum extractor rejection: a body that won't deserialize, a malformed path or query string
pub trait ExtractorRejection {
    fn rejection_status(&self) -> StatusCode;
    fn rejection_text(&self) -> String;
}

macro_rules! impl_extractor_rejection {
    ($($rejection:ty),*) => {
        $(
            impl ExtractorRejection for $rejection {
                fn rejection_status(&self) -> StatusCode {
                    self.status()
                }
                fn rejection_text(&self) -> String {
                    self.body_text()
                }
            }
        )*
    };
}

impl_extractor_rejection!(JsonRejection, PathRejection, QueryRejection);

/// Render an extractor rejection as an [ErrorResponseBody] with code "bad-request"
///
/// The status is axum's (400, 415 or 422, depending on what went wrong).
pub fn bad_request(rejection: impl ExtractorRejection) -> axum::response::Response {
    let msg = rejection.rejection_text();
    info!("Rejecting a malformed request: {}", msg);
    error_response(rejection.rejection_status(), "bad-request", msg)
}

/// Application state available to all handlers
pub struct Cafe {
    pub sessions: Sessions,
    pub catalog: Catalog,
}

async fn healthcheck() -> &'static str {
    "GOOD"
}

#[derive(Clone, Debug, Default)]
struct RequestIdGenerator {
    counter: Arc<AtomicU64>,
}

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        self.counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
            .pipe(|s| HeaderValue::from_str(&s).ok())
            .map(RequestId::new)
    }
}

/// Make the hello-cafe [Router]
pub fn make_router(state: Arc<Cafe>) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .nest("/v1/admin", admins::make_router(state.clone()))
        .nest("/v1/items", items::make_router(state.clone()))
        // Requests should hit `SetRequestIdLayer` first, so it has to be the last (outermost) layer
        // applied; `PropagateRequestIdLayer` then copies the id onto the response.
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            RequestIdGenerator::default(),
        ))
        .with_state(state)
}
