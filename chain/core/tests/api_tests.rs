// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! Signal listener endpoints exercised in-process.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::util::ServiceExt;

use chainreact_core::presentation::api::{router, ApiState};

use common::test_chain;

fn state(port: u16) -> Arc<ApiState> {
    let chain = test_chain(port);
    Arc::new(ApiState {
        identity: "primary".to_string(),
        port,
        manager: chain.manager,
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_instance_and_port() {
    let app = router(state(41300));
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["instance"], "primary");
    assert_eq!(body["port"], 41300);
}

#[tokio::test]
async fn index_lists_endpoints() {
    let app = router(state(41310));
    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["endpoints"]["signal"], "/signal");
    assert_eq!(body["endpoints"]["health"], "/health");
}

#[tokio::test]
async fn known_signals_are_acknowledged() {
    for signal in ["continue", "react"] {
        let app = router(state(41320));
        let request = Request::post("/signal")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(
                r#"{{"signal":"{signal}","from":"clone_1"}}"#
            )))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["instance"], "primary");
    }
}

#[tokio::test]
async fn unknown_signal_is_a_bad_request() {
    let app = router(state(41330));
    let request = Request::post("/signal")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"signal":"detonate","from":"clone_1"}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
}
