// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Chain Topology
//!
//! Maintains the singly-linked ordering of instances: every record
//! points at the signal URL of its successor, the tail points at
//! nothing. `join` appends at the tail; `leave` splices a record out
//! by rewriting its predecessor.
//!
//! Neither operation is transactional against the store. A crash
//! between the relink and the delete in `leave` leaves the
//! predecessor pointing at a deleted node's address, which manifests
//! as a failed future signal delivery (not data loss) and is
//! repaired by re-running the leave/join flows.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::domain::instance::InstanceRecord;
use crate::domain::repository::{InstanceRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Chain state corrupted: {0}")]
    Corrupted(String),

    #[error("Instance not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct ChainTopology {
    instances: Arc<dyn InstanceRepository>,
    host: String,
}

impl ChainTopology {
    pub fn new(instances: Arc<dyn InstanceRepository>, host: impl Into<String>) -> Self {
        Self {
            instances,
            host: host.into(),
        }
    }

    /// Signal URL for a port on this host.
    pub fn signal_url(&self, port: u16) -> String {
        format!("http://{}:{}/signal", self.host, port)
    }

    /// Link a newly allocated record in as the ring's tail.
    ///
    /// The current tail is the record with the greatest port. Its
    /// successor pointer is rewritten to the new record's signal URL,
    /// then the new record (with an empty successor) is persisted. A
    /// duplicated greatest port violates the uniqueness invariant and
    /// is reported as corruption rather than resolved.
    pub async fn join(&self, record: &InstanceRecord) -> Result<(), TopologyError> {
        let all = self.instances.list_all().await?;

        if let Some(max_port) = all.iter().map(|r| r.port).max() {
            let mut tails = all.iter().filter(|r| r.port == max_port);
            let tail = tails.next();
            if tails.next().is_some() {
                return Err(TopologyError::Corrupted(format!(
                    "multiple records share greatest port {max_port}"
                )));
            }
            if let Some(tail) = tail {
                let mut tail = tail.clone();
                tail.successor_url = self.signal_url(record.port);
                self.instances.save(&tail).await?;
                info!(
                    predecessor = %tail.identity,
                    successor = %record.identity,
                    url = %tail.successor_url,
                    "linked new tail into chain"
                );
            }
        }

        self.instances.save(record).await?;
        Ok(())
    }

    /// Splice an instance out of the ring and delete its record.
    ///
    /// The predecessor (if any) is rewritten to point at the leaving
    /// record's successor; a head has no predecessor and needs no
    /// relink. Relink and delete are two separate store mutations.
    pub async fn leave(&self, identity: &str) -> Result<InstanceRecord, TopologyError> {
        let record = self
            .instances
            .find_by_identity(identity)
            .await?
            .ok_or_else(|| TopologyError::NotFound(identity.to_string()))?;

        let own_url = self.signal_url(record.port);
        if let Some(mut predecessor) = self.instances.find_by_successor_url(&own_url).await? {
            predecessor.successor_url = record.successor_url.clone();
            self.instances.save(&predecessor).await?;
            info!(
                predecessor = %predecessor.identity,
                removed = %record.identity,
                new_successor = %predecessor.successor_url,
                "relinked chain around leaving instance"
            );
        }

        self.instances.delete(identity).await?;
        info!(identity, port = record.port, "removed instance from chain");
        Ok(record)
    }
}
