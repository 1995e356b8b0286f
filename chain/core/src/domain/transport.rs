// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Reaction Transport Boundary
//!
//! The message bus that delivers inbound events and applies reactions
//! is external to this system. This trait is the seam: the core only
//! needs to validate credentials, poll events, set or clear a
//! reaction on a target, and send plain replies for management
//! command output.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::pack::TargetKey;

/// One inbound event observed by an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: String,
    pub message_id: i64,
    /// User that produced the event; keys pending management flows.
    pub sender_id: i64,
    pub text: Option<String>,
}

impl InboundEvent {
    /// Stable event identity used for deterministic assignment.
    pub fn event_id(&self) -> String {
        self.message_id.to_string()
    }

    pub fn target(&self) -> TargetKey {
        TargetKey::new(self.chat_id.clone(), self.message_id)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rejected by transport: {0}")]
    Rejected(String),
}

/// Opaque message-bus client capability set.
#[async_trait]
pub trait ReactionTransport: Send + Sync {
    /// Validate a credential against the transport's identity check.
    /// Returns the public handle bound to the credential.
    async fn validate_credential(&self, credential: &str) -> Result<String, TransportError>;

    /// Poll pending inbound events for the instance owning `credential`.
    async fn poll_events(&self, credential: &str) -> Result<Vec<InboundEvent>, TransportError>;

    /// Apply (`Some`) or clear (`None`) a reaction on a target message.
    async fn set_reaction(
        &self,
        credential: &str,
        target: &TargetKey,
        item: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Send a plain text reply to a chat (management command output).
    async fn send_message(
        &self,
        credential: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), TransportError>;
}
