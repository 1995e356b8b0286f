// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Signal Propagation
//!
//! Fire-and-forget delivery of the chain trigger to a successor
//! instance. Outcomes are logged and never escalated: a slow or
//! unreachable successor must not stall the instance that just
//! finished its own reaction, so sends run as detached tasks with a
//! short timeout and no retry. A dropped signal simply ends that
//! sweep at the failure point.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Wire body of a chain signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalPayload {
    pub signal: String,
    pub from: String,
}

impl SignalPayload {
    /// The relay nudge sent to a successor.
    pub fn continue_from(identity: impl Into<String>) -> Self {
        Self {
            signal: "continue".to_string(),
            from: identity.into(),
        }
    }
}

#[derive(Clone)]
pub struct SignalPropagator {
    client: reqwest::Client,
}

impl SignalPropagator {
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "signal client builder failed, using default client without timeout");
                reqwest::Client::new()
            });
        Self { client }
    }

    /// Dispatch a signal toward `successor_url` without blocking the
    /// caller. An empty URL marks the ring's tail and is a no-op.
    pub fn notify(&self, from: &str, successor_url: &str) {
        if successor_url.is_empty() {
            debug!(from, "tail of chain, no successor to signal");
            return;
        }

        let propagator = self.clone();
        let payload = SignalPayload::continue_from(from);
        let url = successor_url.to_string();
        tokio::spawn(async move {
            propagator.send(&payload, &url).await;
        });
    }

    /// Deliver one signal and report whether the successor accepted it.
    pub async fn send(&self, payload: &SignalPayload, url: &str) -> bool {
        match self.client.post(url).json(payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!(from = %payload.from, url, "signal delivered");
                true
            }
            Ok(response) => {
                error!(
                    from = %payload.from,
                    url,
                    status = %response.status(),
                    "successor rejected signal"
                );
                false
            }
            Err(err) => {
                error!(from = %payload.from, url, error = %err, "signal delivery failed");
                false
            }
        }
    }
}
