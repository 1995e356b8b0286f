// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Port Allocation
//!
//! Hands out the numeric identity for a new instance: the smallest
//! port at or above the configured floor that no persisted record
//! holds. Pure function of store state: there is no reservation
//! step, so the caller must persist the record promptly. Two
//! concurrent joins can compute the same port before either persists;
//! that window is accepted and narrowed in practice by staggering
//! joins.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::repository::{InstanceRepository, RepositoryError};

pub struct PortAllocator {
    instances: Arc<dyn InstanceRepository>,
    floor: u16,
}

impl PortAllocator {
    pub fn new(instances: Arc<dyn InstanceRepository>, floor: u16) -> Self {
        Self { instances, floor }
    }

    pub fn floor(&self) -> u16 {
        self.floor
    }

    /// Smallest unused port at or above the floor.
    pub async fn allocate(&self) -> Result<u16, RepositoryError> {
        let used: HashSet<u16> = self
            .instances
            .list_all()
            .await?
            .iter()
            .map(|record| record.port)
            .collect();

        let mut port = self.floor;
        while used.contains(&port) {
            port += 1;
        }
        Ok(port)
    }
}
