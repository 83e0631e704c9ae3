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

//! # Item API
//!
//! The catalog, over HTTP. Every route here requires an access token, carried either as
//! `Authorization: Bearer <token>` or in an `access-token` header; the [authenticate] middleware
//! resolves it to an [Admin] & hands that to the handler as an [Extension].

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer};
use tracing::{debug, error, info};

use crate::{
    catalog::{Error, ItemFields},
    entities::Admin,
    http::{bad_request, error_response, Cafe},
    sessions,
};

/// Log a catalog failure & render it; internal failures are logged in full
fn failure(err: Error) -> axum::response::Response {
    let (status, msg) = err.as_status_and_msg();
    if status.is_server_error() {
        error!("{:#?}", err);
    } else {
        info!("{}", err);
    }
    error_response(status, err.code(), msg)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         authentication                                         //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Pull the access token out of the request headers, if there is one
///
/// A single `Authorization` header using the Bearer scheme wins; failing that, we look for an
/// `access-token` header. Anything else (including multiple `Authorization` headers) yields
/// `None`.
fn access_token(headers: &HeaderMap) -> Option<String> {
    let from_authorization = headers
        .get_all("authorization")
        .into_iter()
        .at_most_one()
        .ok()
        .flatten()
        .and_then(|value| value.to_str().ok())
        .and_then(|text| text.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned());
    from_authorization.or_else(|| {
        headers
            .get("access-token")
            .and_then(|value| value.to_str().ok())
            .map(|token| token.trim().to_owned())
    })
}

/// Authenticate the request, rejecting it outright if the token doesn't check out
async fn authenticate(
    State(state): State<Arc<Cafe>>,
    headers: HeaderMap,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    match state
        .sessions
        .check_token(access_token(&headers).as_deref())
        .await
    {
        Ok(admin) => {
            debug!("hello-cafe authorized admin {}", admin.id());
            request.extensions_mut().insert(admin);
            next.run(request).await
        }
        Err(err) => {
            let (status, msg) = err.as_status_and_msg();
            match err {
                sessions::Error::Storage { .. } => error!("{:#?}", err),
                _ => info!("hello-cafe failed to authenticate this request: {}", err),
            }
            error_response(status, err.code(), msg)
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            handlers                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

async fn create_item(
    State(state): State<Arc<Cafe>>,
    Extension(admin): Extension<Admin>,
    fields: Result<Json<ItemFields>, JsonRejection>,
) -> axum::response::Response {
    let Json(fields) = match fields {
        Ok(fields) => fields,
        Err(err) => return bad_request(err),
    };
    match state.catalog.create_item(admin.id(), &fields).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(err) => failure(err),
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FindItemsReq {
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
}

async fn find_items(
    State(state): State<Arc<Cafe>>,
    Extension(admin): Extension<Admin>,
    req: Result<Query<FindItemsReq>, QueryRejection>,
) -> axum::response::Response {
    let Query(req) = match req {
        Ok(req) => req,
        Err(err) => return bad_request(err),
    };
    match state
        .catalog
        .find_items(
            admin.id(),
            req.cursor.unwrap_or_default(),
            req.limit.unwrap_or_default(),
        )
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(err) => failure(err),
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SearchItemsReq {
    pub text: Option<String>,
}

async fn search_items(
    State(state): State<Arc<Cafe>>,
    Extension(admin): Extension<Admin>,
    req: Result<Query<SearchItemsReq>, QueryRejection>,
) -> axum::response::Response {
    let Query(req) = match req {
        Ok(req) => req,
        Err(err) => return bad_request(err),
    };
    match state
        .catalog
        .search_items(admin.id(), req.text.as_deref())
        .await
    {
        Ok(items) => Json(items).into_response(),
        Err(err) => failure(err),
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BarcodeReq {
    pub barcode: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BarcodeRsp {
    pub duplicate: bool,
}

async fn check_barcode(
    State(state): State<Arc<Cafe>>,
    req: Result<Query<BarcodeReq>, QueryRejection>,
) -> axum::response::Response {
    let Query(req) = match req {
        Ok(req) => req,
        Err(err) => return bad_request(err),
    };
    match state
        .catalog
        .check_duplicate_barcode(req.barcode.as_deref().unwrap_or_default())
        .await
    {
        Ok(duplicate) => Json(BarcodeRsp { duplicate }).into_response(),
        Err(err) => failure(err),
    }
}

async fn get_item(
    State(state): State<Arc<Cafe>>,
    Extension(admin): Extension<Admin>,
    item_id: Result<Path<i64>, PathRejection>,
) -> axum::response::Response {
    let Path(item_id) = match item_id {
        Ok(item_id) => item_id,
        Err(err) => return bad_request(err),
    };
    match state.catalog.get_item(admin.id(), item_id).await {
        Ok(item) => Json(item).into_response(),
        Err(err) => failure(err),
    }
}

async fn update_item(
    State(state): State<Arc<Cafe>>,
    Extension(admin): Extension<Admin>,
    item_id: Result<Path<i64>, PathRejection>,
    fields: Result<Json<ItemFields>, JsonRejection>,
) -> axum::response::Response {
    let Path(item_id) = match item_id {
        Ok(item_id) => item_id,
        Err(err) => return bad_request(err),
    };
    let Json(fields) = match fields {
        Ok(fields) => fields,
        Err(err) => return bad_request(err),
    };
    match state.catalog.update_item(admin.id(), item_id, &fields).await {
        Ok(item) => Json(item).into_response(),
        Err(err) => failure(err),
    }
}

async fn delete_item(
    State(state): State<Arc<Cafe>>,
    Extension(admin): Extension<Admin>,
    item_id: Result<Path<i64>, PathRejection>,
) -> axum::response::Response {
    let Path(item_id) = match item_id {
        Ok(item_id) => item_id,
        Err(err) => return bad_request(err),
    };
    match state.catalog.delete_item(admin.id(), item_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => failure(err),
    }
}

pub fn make_router(state: Arc<Cafe>) -> Router<Arc<Cafe>> {
    Router::new()
        .route("/", get(find_items).post(create_item))
        .route("/search", get(search_items))
        .route("/barcode", get(check_barcode))
        .route(
            "/{item_id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            authenticate,
        ))
        // All responses are JSON; add the appropriate Content-Type header (but leave the existing
        // Content-Type header should a handler set it specially).
        .layer(SetResponseHeaderLayer::if_not_present(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
