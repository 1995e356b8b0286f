// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Signal Listener
//!
//! Per-instance HTTP surface: the chain-signal receiver plus a small
//! introspection pair. Replying 200 acknowledges receipt only; the
//! forwarding work runs detached so a slow successor chain never
//! blocks the sender.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::application::lifecycle::InstanceLifecycleManager;
use crate::infrastructure::signal::SignalPayload;

/// Signals a receiver accepts; anything else is a 400.
const ACCEPTED_SIGNALS: [&str; 2] = ["continue", "react"];

pub struct ApiState {
    pub identity: String,
    pub port: u16,
    pub manager: Arc<InstanceLifecycleManager>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/signal", post(handle_signal))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until the shutdown future resolves.
pub async fn serve(
    state: Arc<ApiState>,
    host: &str,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = format!("{}:{}", host, state.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(instance = %state.identity, %addr, "signal listener bound");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index(State(state): State<Arc<ApiState>>) -> Json<Value> {
    Json(json!({
        "instance": state.identity,
        "port": state.port,
        "endpoints": {
            "signal": "/signal",
            "health": "/health",
        },
    }))
}

async fn health(State(state): State<Arc<ApiState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "instance": state.identity,
        "port": state.port,
    }))
}

async fn handle_signal(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<SignalPayload>,
) -> (StatusCode, Json<Value>) {
    if !ACCEPTED_SIGNALS.contains(&payload.signal.as_str()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": format!("unknown signal: {}", payload.signal),
            })),
        );
    }

    info!(
        instance = %state.identity,
        from = %payload.from,
        signal = %payload.signal,
        "chain signal received"
    );

    // Acknowledge immediately; forwarding continues detached.
    let manager = state.manager.clone();
    let identity = state.identity.clone();
    tokio::spawn(async move {
        if let Err(err) = manager.forward_signal(&identity).await {
            warn!(instance = %identity, error = %err, "failed to forward received signal");
        }
    });

    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "instance": state.identity,
        })),
    )
}
