// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate, one repository per
//! aggregate: interface defined here, implemented in
//! `crate::infrastructure`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `InstanceRepository` | `InstanceRecord` | `InMemoryInstanceRepository`, `SledInstanceRepository` |
//! | `PackRepository` | `Pack` | `InMemoryPackRepository`, `SledPackRepository` |
//! | `OverrideRepository` | `Override` | `InMemoryOverrideRepository`, `SledOverrideRepository` |
//!
//! Concrete implementations are selected at startup from the config
//! manifest. In-memory implementations serve development and testing;
//! sled persistence is used for production runs.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::instance::InstanceRecord;
use crate::domain::pack::{Override, Pack, TargetKey};

/// Storage backend selector for pluggable persistence.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    Sled(SledConfig),
}

#[derive(Debug, Clone)]
pub struct SledConfig {
    /// Path of the sled database directory.
    pub path: PathBuf,
}

/// Repository interface for instance records.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Save a record (create or update, keyed by identity).
    async fn save(&self, record: &InstanceRecord) -> Result<(), RepositoryError>;

    /// Find a record by identity.
    async fn find_by_identity(&self, identity: &str)
        -> Result<Option<InstanceRecord>, RepositoryError>;

    /// Find the record holding a given credential.
    async fn find_by_secret(&self, secret: &str)
        -> Result<Option<InstanceRecord>, RepositoryError>;

    /// Find the record whose successor pointer is `url` (ring predecessor).
    async fn find_by_successor_url(&self, url: &str)
        -> Result<Option<InstanceRecord>, RepositoryError>;

    /// List all records, ordered by port ascending.
    async fn list_all(&self) -> Result<Vec<InstanceRecord>, RepositoryError>;

    /// Delete a record by identity.
    async fn delete(&self, identity: &str) -> Result<(), RepositoryError>;

    /// Number of persisted records.
    async fn count(&self) -> Result<usize, RepositoryError>;
}

/// Repository interface for packs.
#[async_trait]
pub trait PackRepository: Send + Sync {
    /// Save a pack (create or wholesale replace, keyed by name).
    async fn save(&self, pack: &Pack) -> Result<(), RepositoryError>;

    /// Find a pack by name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Pack>, RepositoryError>;

    /// List all packs, ordered by name ascending. The deterministic
    /// assignment engine relies on this ordering for reproducibility.
    async fn list_all(&self) -> Result<Vec<Pack>, RepositoryError>;

    /// Delete a pack by name. Returns whether a pack was removed.
    async fn delete(&self, name: &str) -> Result<bool, RepositoryError>;
}

/// Repository interface for per-target overrides.
#[async_trait]
pub trait OverrideRepository: Send + Sync {
    /// Insert an override, deleting any prior entry for the same target.
    async fn set(&self, entry: &Override) -> Result<(), RepositoryError>;

    /// Look up the live override for a target, if any.
    async fn get(&self, target: &TargetKey) -> Result<Option<Override>, RepositoryError>;

    /// Delete the override for a target, if present.
    async fn delete(&self, target: &TargetKey) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sled::Error> for RepositoryError {
    fn from(err: sled::Error) -> Self {
        RepositoryError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
