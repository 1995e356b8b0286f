// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! Signal delivery against a mock successor.

use chainreact_core::infrastructure::signal::{SignalPayload, SignalPropagator};

#[tokio::test]
async fn accepted_signal_reports_delivery() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/signal")
        .match_header("content-type", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"success","instance":"clone_1"}"#)
        .create_async()
        .await;

    let propagator = SignalPropagator::new(2);
    let payload = SignalPayload::continue_from("primary");
    let delivered = propagator
        .send(&payload, &format!("{}/signal", server.url()))
        .await;

    assert!(delivered);
    mock.assert_async().await;
}

#[tokio::test]
async fn rejected_signal_reports_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/signal")
        .with_status(500)
        .create_async()
        .await;

    let propagator = SignalPropagator::new(2);
    let payload = SignalPayload::continue_from("primary");
    assert!(
        !propagator
            .send(&payload, &format!("{}/signal", server.url()))
            .await
    );
}

#[tokio::test]
async fn unreachable_successor_reports_failure() {
    let propagator = SignalPropagator::new(1);
    let payload = SignalPayload::continue_from("primary");
    // Port 9 is discard; nothing is listening over TCP here.
    assert!(!propagator.send(&payload, "http://127.0.0.1:9/signal").await);
}
