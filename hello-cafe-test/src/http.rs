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

//! Integration tests for the HTTP API.
//!
//! These drive the complete [Router] in-process, one request at a time, via
//! [tower::ServiceExt::oneshot]; no sockets involved.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::ServiceExt;

use hello_cafe::{
    admins::{SigninRsp, SignupRsp},
    catalog::ItemsPage,
    entities::Item,
    http::{make_router, Cafe, ErrorResponseBody},
    items::BarcodeRsp,
};
use libtest_mimic::Failed;

use crate::item_fields;

/// Send `request`; return the status & the raw body
async fn send(router: &Router, request: Request<Body>) -> Result<(StatusCode, Vec<u8>), Failed> {
    let rsp = router.clone().oneshot(request).await?;
    let status = rsp.status();
    let body = rsp.into_body().collect().await?.to_bytes().to_vec();
    Ok((status, body))
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, Failed> {
    Ok(serde_json::from_slice::<T>(body)?)
}

fn post_json(uri: &str, body: &Value) -> Result<Request<Body>, Failed> {
    Ok(Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?)
}

fn authorized(method: &str, uri: &str, token: &str, body: Body) -> Result<Request<Body>, Failed> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(body)?)
}

async fn sign_up_and_in(router: &Router, phone: &str) -> Result<String, Failed> {
    let (status, body) = send(
        router,
        post_json(
            "/v1/admin/sign-up",
            &json!({"phone": phone, "password": "password1234", "name": "Park"}),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::CREATED, status);
    let rsp: SignupRsp = parse(&body)?;
    assert_eq!("Welcome to hello-cafe!", rsp.greeting);

    let (status, body) = send(
        router,
        post_json(
            "/v1/admin/sign-in",
            &json!({"phone": phone, "password": "password1234"}),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::OK, status);
    Ok(parse::<SigninRsp>(&body)?.token)
}

pub async fn test_healthcheck(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let router = make_router(cafe);
    let (status, body) = send(
        &router,
        Request::builder().uri("/healthcheck").body(Body::empty())?,
    )
    .await?;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(b"GOOD", &body[..]);
    Ok(())
}

/// Sign-up, sign-in, work with an item, sign-out; the token is dead thereafter
pub async fn test_session_round_trip(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let router = make_router(cafe);
    let token = sign_up_and_in(&router, "010-3000-0001").await?;

    let (status, body) = send(
        &router,
        authorized(
            "POST",
            "/v1/items",
            &token,
            Body::from(serde_json::to_string(&item_fields("880012345", "아메리카노"))?),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::CREATED, status);
    let item: Item = parse(&body)?;
    assert_eq!("ㅇㅁㄹㅋㄴ", item.initials);

    // The `access-token` header works just as well as `Authorization`
    let (status, body) = send(
        &router,
        Request::builder()
            .uri("/v1/items?limit=5")
            .header("access-token", &token)
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(StatusCode::OK, status);
    let page: ItemsPage = parse(&body)?;
    assert_eq!(vec![item.clone()], page.items);

    let (status, body) = send(
        &router,
        authorized(
            "GET",
            &format!("/v1/items/search?text={}", "%E3%85%87%E3%85%81"), // "ㅇㅁ"
            &token,
            Body::empty(),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(vec![item.clone()], parse::<Vec<Item>>(&body)?);

    let (status, body) = send(
        &router,
        authorized(
            "GET",
            "/v1/items/barcode?barcode=880012345",
            &token,
            Body::empty(),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::OK, status);
    assert!(parse::<BarcodeRsp>(&body)?.duplicate);

    let (status, _) = send(
        &router,
        post_json(
            "/v1/admin/sign-out",
            &json!({"phone": "010-3000-0001", "token": token}),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::OK, status);

    let (status, body) = send(
        &router,
        authorized(
            "GET",
            &format!("/v1/items/{}", item.id),
            &token,
            Body::empty(),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::UNAUTHORIZED, status);
    assert_eq!("revoked-token", parse::<ErrorResponseBody>(&body)?.code);

    let (status, body) = send(
        &router,
        post_json(
            "/v1/admin/sign-out",
            &json!({"phone": "010-3000-0001", "token": token}),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::CONFLICT, status);
    assert_eq!("already-logged-out", parse::<ErrorResponseBody>(&body)?.code);
    Ok(())
}

pub async fn test_unauthenticated(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let router = make_router(cafe);

    let (status, body) = send(
        &router,
        Request::builder().uri("/v1/items").body(Body::empty())?,
    )
    .await?;
    assert_eq!(StatusCode::UNAUTHORIZED, status);
    assert_eq!("missing-token", parse::<ErrorResponseBody>(&body)?.code);

    let (status, body) = send(
        &router,
        authorized("GET", "/v1/items", "garbage", Body::empty())?,
    )
    .await?;
    assert_eq!(StatusCode::UNAUTHORIZED, status);
    assert_eq!("invalid-token", parse::<ErrorResponseBody>(&body)?.code);

    let (status, body) = send(
        &router,
        post_json(
            "/v1/admin/sign-in",
            &json!({"phone": "010-3000-0002", "password": "password1234"}),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::UNAUTHORIZED, status);
    assert_eq!("unknown-account", parse::<ErrorResponseBody>(&body)?.code);
    Ok(())
}

/// Status codes for catalog failures
pub async fn test_item_errors(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let router = make_router(cafe);
    let owner = sign_up_and_in(&router, "010-3000-0003").await?;
    let stranger = sign_up_and_in(&router, "010-3000-0004").await?;

    let (status, body) = send(
        &router,
        authorized(
            "POST",
            "/v1/items",
            &owner,
            Body::from(serde_json::to_string(&item_fields("880077777", "카페라떼"))?),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::CREATED, status);
    let item: Item = parse(&body)?;

    // Duplicate barcode
    let (status, body) = send(
        &router,
        authorized(
            "POST",
            "/v1/items",
            &stranger,
            Body::from(serde_json::to_string(&item_fields("880077777", "카페모카"))?),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::CONFLICT, status);
    assert_eq!("duplicate-item", parse::<ErrorResponseBody>(&body)?.code);

    // Validation failure
    let (status, body) = send(
        &router,
        authorized(
            "POST",
            "/v1/items",
            &owner,
            Body::from(json!({"barcode": "880077778"}).to_string()),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::BAD_REQUEST, status);
    assert_eq!("missing-category", parse::<ErrorResponseBody>(&body)?.code);

    // Someone else's item
    let (status, body) = send(
        &router,
        authorized(
            "PUT",
            &format!("/v1/items/{}", item.id),
            &stranger,
            Body::from(json!({"price": 1}).to_string()),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::NOT_FOUND, status);
    assert_eq!("not-exist-item", parse::<ErrorResponseBody>(&body)?.code);

    // The owner may update & delete it
    let (status, body) = send(
        &router,
        authorized(
            "PUT",
            &format!("/v1/items/{}", item.id),
            &owner,
            Body::from(json!({"price": 5500}).to_string()),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(5500, parse::<Item>(&body)?.price);

    let (status, _) = send(
        &router,
        authorized(
            "DELETE",
            &format!("/v1/items/{}", item.id),
            &owner,
            Body::empty(),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::NO_CONTENT, status);

    let (status, _) = send(
        &router,
        authorized(
            "GET",
            &format!("/v1/items/{}", item.id),
            &owner,
            Body::empty(),
        )?,
    )
    .await?;
    assert_eq!(StatusCode::NOT_FOUND, status);
    Ok(())
}

/// Requests axum can't make sense of still get a JSON error body
pub async fn test_malformed_requests(cafe: Arc<Cafe>) -> Result<(), Failed> {
    let router = make_router(cafe);

    let (status, body) = send(
        &router,
        post_json("/v1/admin/sign-in", &json!({"phone": 12}))?,
    )
    .await?;
    assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, status);
    assert_eq!("bad-request", parse::<ErrorResponseBody>(&body)?.code);

    let (status, body) = send(
        &router,
        Request::builder()
            .method("POST")
            .uri("/v1/admin/sign-up")
            .body(Body::from(r#"{"phone": "010-3000-0005"}"#))?,
    )
    .await?;
    assert_eq!(StatusCode::UNSUPPORTED_MEDIA_TYPE, status);
    assert_eq!("bad-request", parse::<ErrorResponseBody>(&body)?.code);

    let token = sign_up_and_in(&router, "010-3000-0006").await?;

    let (status, body) = send(
        &router,
        authorized("GET", "/v1/items/latte", &token, Body::empty())?,
    )
    .await?;
    assert_eq!(StatusCode::BAD_REQUEST, status);
    assert_eq!("bad-request", parse::<ErrorResponseBody>(&body)?.code);

    let (status, body) = send(
        &router,
        authorized("GET", "/v1/items?limit=lots", &token, Body::empty())?,
    )
    .await?;
    assert_eq!(StatusCode::BAD_REQUEST, status);
    assert_eq!("bad-request", parse::<ErrorResponseBody>(&body)?.code);

    let (status, body) = send(
        &router,
        authorized("POST", "/v1/items", &token, Body::from("{not json"))?,
    )
    .await?;
    assert_eq!(StatusCode::BAD_REQUEST, status);
    assert_eq!("bad-request", parse::<ErrorResponseBody>(&body)?.code);
    Ok(())
}
