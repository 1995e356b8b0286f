// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! Shared test harness: an in-memory chain with a scripted transport.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use chainreact_core::application::lifecycle::InstanceLifecycleManager;
use chainreact_core::domain::config::ChainConfig;
use chainreact_core::domain::pack::TargetKey;
use chainreact_core::domain::transport::{InboundEvent, ReactionTransport, TransportError};
use chainreact_core::infrastructure::repositories::{
    InMemoryInstanceRepository, InMemoryOverrideRepository, InMemoryPackRepository,
};

pub const PRIMARY_SECRET: &str = "1000000001:primary-credential-primary-credential";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReaction {
    pub credential: String,
    pub target: TargetKey,
    pub item: Option<String>,
}

/// Transport double: events are scripted per credential, reactions and
/// replies are recorded for assertions.
#[derive(Default)]
pub struct MockTransport {
    events: Mutex<HashMap<String, VecDeque<InboundEvent>>>,
    reactions: Mutex<Vec<RecordedReaction>>,
    messages: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue an inbound event for the instance holding `credential`.
    pub fn push_event(&self, credential: &str, event: InboundEvent) {
        self.events
            .lock()
            .unwrap()
            .entry(credential.to_string())
            .or_default()
            .push_back(event);
    }

    pub fn reactions(&self) -> Vec<RecordedReaction> {
        self.reactions.lock().unwrap().clone()
    }

    /// (chat_id, text) pairs sent as command replies.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReactionTransport for MockTransport {
    async fn validate_credential(&self, credential: &str) -> Result<String, TransportError> {
        let (id, rest) = credential
            .split_once(':')
            .ok_or_else(|| TransportError::InvalidCredential("missing separator".to_string()))?;
        if id.is_empty() || rest.is_empty() {
            return Err(TransportError::InvalidCredential(
                "empty credential part".to_string(),
            ));
        }
        Ok(format!("mock_{id}"))
    }

    async fn poll_events(&self, credential: &str) -> Result<Vec<InboundEvent>, TransportError> {
        let mut queues = self.events.lock().unwrap();
        Ok(queues
            .get_mut(credential)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default())
    }

    async fn set_reaction(
        &self,
        credential: &str,
        target: &TargetKey,
        item: Option<&str>,
    ) -> Result<(), TransportError> {
        self.reactions.lock().unwrap().push(RecordedReaction {
            credential: credential.to_string(),
            target: target.clone(),
            item: item.map(str::to_string),
        });
        Ok(())
    }

    async fn send_message(
        &self,
        _credential: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), TransportError> {
        self.messages
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

pub struct TestChain {
    pub manager: Arc<InstanceLifecycleManager>,
    pub transport: Arc<MockTransport>,
}

/// In-memory chain with fast polling and no start stagger. Each test
/// that actually starts workers picks a distinct `port_floor` so bound
/// listeners never collide across concurrently-running tests.
pub fn test_chain(port_floor: u16) -> TestChain {
    let mut config = ChainConfig::default();
    config.storage.backend = "memory".to_string();
    config.network.port_floor = port_floor;
    config.worker.poll_interval_ms = 10;
    config.worker.signal_timeout_secs = 1;
    config.worker.start_stagger_ms = 0;
    config.primary_credential = Some(PRIMARY_SECRET.to_string());

    let transport = MockTransport::new();
    let manager = InstanceLifecycleManager::new(
        &config,
        Arc::new(InMemoryInstanceRepository::new()),
        Arc::new(InMemoryPackRepository::new()),
        Arc::new(InMemoryOverrideRepository::new()),
        transport.clone(),
    );
    TestChain { manager, transport }
}

/// A plain (non-command) inbound event.
pub fn event(chat_id: &str, message_id: i64) -> InboundEvent {
    InboundEvent {
        chat_id: chat_id.to_string(),
        message_id,
        sender_id: 77,
        text: Some("an ordinary message".to_string()),
    }
}
