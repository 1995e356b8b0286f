// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! Logging transport: a stand-in message-bus client that validates
//! credential shape locally, delivers no inbound events, and logs
//! every reaction and reply instead of sending them. Lets a chain run
//! end to end (bootstrap, signal propagation, management flows driven
//! through tests) without an external bus.

use async_trait::async_trait;
use tracing::info;

use crate::domain::pack::TargetKey;
use crate::domain::transport::{InboundEvent, ReactionTransport, TransportError};

#[derive(Default)]
pub struct LoggingTransport;

impl LoggingTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReactionTransport for LoggingTransport {
    async fn validate_credential(&self, credential: &str) -> Result<String, TransportError> {
        let (id, rest) = credential
            .split_once(':')
            .ok_or_else(|| TransportError::InvalidCredential("missing separator".to_string()))?;
        if id.is_empty() || rest.is_empty() {
            return Err(TransportError::InvalidCredential(
                "empty credential part".to_string(),
            ));
        }
        Ok(format!("local_{id}"))
    }

    async fn poll_events(&self, _credential: &str) -> Result<Vec<InboundEvent>, TransportError> {
        Ok(Vec::new())
    }

    async fn set_reaction(
        &self,
        credential: &str,
        target: &TargetKey,
        item: Option<&str>,
    ) -> Result<(), TransportError> {
        let prefix = credential.split(':').next().unwrap_or("?");
        match item {
            Some(item) => info!(credential = prefix, target = %target, item, "reaction set"),
            None => info!(credential = prefix, target = %target, "reaction cleared"),
        }
        Ok(())
    }

    async fn send_message(
        &self,
        credential: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), TransportError> {
        let prefix = credential.split(':').next().unwrap_or("?");
        info!(credential = prefix, chat_id, text, "message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn credential_shape_is_enforced() {
        let transport = LoggingTransport::new();
        assert_eq!(
            transport.validate_credential("12345:abcdef").await.unwrap(),
            "local_12345"
        );
        assert!(transport.validate_credential("no-separator").await.is_err());
        assert!(transport.validate_credential(":tail-only").await.is_err());
    }
}
