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

//! # Admin API
//!
//! Sign-up, sign-in & sign-out.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer};
use tracing::{error, info};

use crate::{
    entities::AdminId,
    http::{bad_request, error_response, Cafe},
    sessions::Error,
};

/// Log a session failure & render it; internal failures are logged in full
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
//                                            sign-up                                             //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Deserialize)]
pub struct SignupReq {
    pub phone: Option<String>,
    pub password: Option<SecretString>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SignupRsp {
    pub greeting: String,
    pub id: AdminId,
}

async fn sign_up(
    State(state): State<Arc<Cafe>>,
    req: Result<Json<SignupReq>, JsonRejection>,
) -> axum::response::Response {
    let Json(req) = match req {
        Ok(req) => req,
        Err(err) => return bad_request(err),
    };
    match state
        .sessions
        .sign_up(
            req.phone.as_deref(),
            req.password.as_ref(),
            req.name.as_deref(),
        )
        .await
    {
        Ok(admin) => (
            StatusCode::CREATED,
            Json(SignupRsp {
                greeting: "Welcome to hello-cafe!".to_owned(),
                id: admin.id(),
            }),
        )
            .into_response(),
        Err(err) => failure(err),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            sign-in                                             //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Deserialize)]
pub struct SigninReq {
    pub phone: Option<String>,
    pub password: Option<SecretString>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SigninRsp {
    pub token: String,
}

async fn sign_in(
    State(state): State<Arc<Cafe>>,
    req: Result<Json<SigninReq>, JsonRejection>,
) -> axum::response::Response {
    let Json(req) = match req {
        Ok(req) => req,
        Err(err) => return bad_request(err),
    };
    match state
        .sessions
        .sign_in(req.phone.as_deref(), req.password.as_ref())
        .await
    {
        Ok(token) => {
            info!("Signed-in {}", req.phone.as_deref().unwrap_or_default());
            (StatusCode::OK, Json(SigninRsp { token })).into_response()
        }
        Err(err) => failure(err),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            sign-out                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SignoutReq {
    pub phone: Option<String>,
    pub token: Option<String>,
}

async fn sign_out(
    State(state): State<Arc<Cafe>>,
    req: Result<Json<SignoutReq>, JsonRejection>,
) -> axum::response::Response {
    let Json(req) = match req {
        Ok(req) => req,
        Err(err) => return bad_request(err),
    };
    match state
        .sessions
        .sign_out(req.phone.as_deref(), req.token.as_deref())
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => failure(err),
    }
}

pub fn make_router(state: Arc<Cafe>) -> Router<Arc<Cafe>> {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
        .route("/sign-out", post(sign_out))
        // All responses are JSON; add the appropriate Content-Type header (but leave the existing
        // Content-Type header should a handler set it specially).
        .layer(SetResponseHeaderLayer::if_not_present(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
