// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Instance Records
//!
//! Durable identity of one worker instance in the ring. Records are
//! created on `join`, destroyed on `leave`, and their `successor_url`
//! is mutated only by the chain topology service, never by workers.

use serde::{Deserialize, Serialize};

/// Fixed identity of the always-protected primary instance.
///
/// The primary receives management commands and can never be removed
/// from the ring (`leave` rejects it with `ProtectedInstance`).
pub const PRIMARY_IDENTITY: &str = "primary";

/// Durable record of one worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Human-readable unique name.
    pub identity: String,
    /// Opaque transport credential; unique across all records.
    pub secret: String,
    /// Loopback port this instance's signal listener binds.
    pub port: u16,
    /// Signal URL of the next instance in the ring; empty for the tail.
    #[serde(default)]
    pub successor_url: String,
}

impl InstanceRecord {
    /// Create a fresh record with no successor (new tail).
    pub fn new(identity: impl Into<String>, secret: impl Into<String>, port: u16) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
            port,
            successor_url: String::new(),
        }
    }

    /// The URL other instances use to signal this one.
    pub fn signal_url(&self, host: &str) -> String {
        format!("http://{}:{}/signal", host, self.port)
    }

    pub fn is_primary(&self) -> bool {
        self.identity == PRIMARY_IDENTITY
    }

    /// Tail of the ring: nothing to forward to.
    pub fn is_tail(&self) -> bool {
        self.successor_url.is_empty()
    }
}

/// Running/stopped view over the store and the running set, used by
/// the `list-instances` management command.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub record: InstanceRecord,
    pub running: bool,
}
