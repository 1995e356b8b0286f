// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Instance Worker
//!
//! One worker task per running instance: an event-receive loop
//! polling the transport, plus the instance's own signal listener.
//! Both are gated on running-set membership: releasing the
//! credential is the cooperative cancellation signal, observed on the
//! next poll tick. In-flight event handling completes before exit.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::application::commands::{self, CommandRegistry};
use crate::application::lifecycle::InstanceLifecycleManager;
use crate::domain::instance::InstanceRecord;
use crate::domain::transport::InboundEvent;
use crate::presentation::api::{self, ApiState};

pub(crate) async fn run(manager: Arc<InstanceLifecycleManager>, record: InstanceRecord) {
    let identity = record.identity.clone();
    let secret = record.secret.clone();

    let state = Arc::new(ApiState {
        identity: identity.clone(),
        port: record.port,
        manager: manager.clone(),
    });
    let shutdown = {
        let manager = manager.clone();
        let secret = secret.clone();
        let interval = manager.poll_interval();
        async move {
            while manager.is_running(&secret) {
                tokio::time::sleep(interval).await;
            }
        }
    };
    let host = manager.host().to_string();
    let listener = tokio::spawn(async move {
        if let Err(err) = api::serve(state, &host, shutdown).await {
            error!(error = %err, "signal listener failed");
        }
    });

    // Management commands are routed to the primary only.
    let registry = record
        .is_primary()
        .then(|| CommandRegistry::new(manager.clone()));

    info!(identity = %identity, port = record.port, "worker loop started");
    while manager.is_running(&secret) {
        match manager.transport().poll_events(&secret).await {
            Ok(events) => {
                for event in events {
                    handle_event(&manager, registry.as_ref(), &record, &event).await;
                }
            }
            Err(err) => warn!(identity = %identity, error = %err, "event poll failed"),
        }
        tokio::time::sleep(manager.poll_interval()).await;
    }

    let _ = listener.await;
    info!(identity = %identity, "worker loop exited");
}

async fn handle_event(
    manager: &Arc<InstanceLifecycleManager>,
    registry: Option<&CommandRegistry>,
    record: &InstanceRecord,
    event: &InboundEvent,
) {
    if let Some(text) = event.text.as_deref() {
        match registry {
            Some(registry) => {
                if let Some(reply) = registry.dispatch(event.sender_id, text).await {
                    if let Err(err) = manager
                        .transport()
                        .send_message(&record.secret, &event.chat_id, &reply)
                        .await
                    {
                        warn!(identity = %record.identity, error = %err, "failed to send command reply");
                    }
                    return;
                }
            }
            None => {
                // Non-primary instances ignore management traffic.
                if commands::parse_command(text).is_some() {
                    debug!(identity = %record.identity, "ignoring command on non-primary instance");
                    return;
                }
            }
        }
    }

    let target = event.target();
    let item = match manager
        .resolve_item(&record.identity, &target, &event.event_id())
        .await
    {
        Ok(item) => item,
        Err(err) => {
            warn!(identity = %record.identity, error = %err, "failed to resolve reaction");
            return;
        }
    };

    match manager
        .transport()
        .set_reaction(&record.secret, &target, Some(&item))
        .await
    {
        Ok(()) => info!(identity = %record.identity, item = %item, target = %target, "applied reaction"),
        Err(err) => {
            warn!(identity = %record.identity, target = %target, error = %err, "failed to apply reaction")
        }
    }

    // Forward the chain even when the reaction failed: the sweep is
    // independent of any single reaction outcome.
    if let Err(err) = manager.forward_signal(&record.identity).await {
        warn!(identity = %record.identity, error = %err, "failed to forward chain signal");
    }
}
