// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! In-memory repository implementations, used for development and
//! tests. State lives in plain mutex-guarded maps; a poisoned lock is
//! surfaced as a database error rather than a panic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::instance::InstanceRecord;
use crate::domain::pack::{Override, Pack, TargetKey};
use crate::domain::repository::{
    InstanceRepository, OverrideRepository, PackRepository, RepositoryError,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Database("lock poisoned".to_string()))
}

#[derive(Default)]
pub struct InMemoryInstanceRepository {
    records: Arc<Mutex<HashMap<String, InstanceRecord>>>,
}

impl InMemoryInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceRepository for InMemoryInstanceRepository {
    async fn save(&self, record: &InstanceRecord) -> Result<(), RepositoryError> {
        lock(&self.records)?.insert(record.identity.clone(), record.clone());
        Ok(())
    }

    async fn find_by_identity(
        &self,
        identity: &str,
    ) -> Result<Option<InstanceRecord>, RepositoryError> {
        Ok(lock(&self.records)?.get(identity).cloned())
    }

    async fn find_by_secret(
        &self,
        secret: &str,
    ) -> Result<Option<InstanceRecord>, RepositoryError> {
        Ok(lock(&self.records)?
            .values()
            .find(|r| r.secret == secret)
            .cloned())
    }

    async fn find_by_successor_url(
        &self,
        url: &str,
    ) -> Result<Option<InstanceRecord>, RepositoryError> {
        Ok(lock(&self.records)?
            .values()
            .find(|r| r.successor_url == url)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<InstanceRecord>, RepositoryError> {
        let mut records: Vec<InstanceRecord> = lock(&self.records)?.values().cloned().collect();
        records.sort_by_key(|r| r.port);
        Ok(records)
    }

    async fn delete(&self, identity: &str) -> Result<(), RepositoryError> {
        lock(&self.records)?.remove(identity);
        Ok(())
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        Ok(lock(&self.records)?.len())
    }
}

#[derive(Default)]
pub struct InMemoryPackRepository {
    packs: Arc<Mutex<HashMap<String, Pack>>>,
}

impl InMemoryPackRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackRepository for InMemoryPackRepository {
    async fn save(&self, pack: &Pack) -> Result<(), RepositoryError> {
        lock(&self.packs)?.insert(pack.name.clone(), pack.clone());
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Pack>, RepositoryError> {
        Ok(lock(&self.packs)?.get(name).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Pack>, RepositoryError> {
        let mut packs: Vec<Pack> = lock(&self.packs)?.values().cloned().collect();
        packs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(packs)
    }

    async fn delete(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(lock(&self.packs)?.remove(name).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryOverrideRepository {
    entries: Arc<Mutex<HashMap<String, Override>>>,
}

impl InMemoryOverrideRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OverrideRepository for InMemoryOverrideRepository {
    async fn set(&self, entry: &Override) -> Result<(), RepositoryError> {
        let mut entries = lock(&self.entries)?;
        let key = entry.target.storage_key();
        entries.remove(&key);
        entries.insert(key, entry.clone());
        Ok(())
    }

    async fn get(&self, target: &TargetKey) -> Result<Option<Override>, RepositoryError> {
        Ok(lock(&self.entries)?.get(&target.storage_key()).cloned())
    }

    async fn delete(&self, target: &TargetKey) -> Result<(), RepositoryError> {
        lock(&self.entries)?.remove(&target.storage_key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn instance_listing_is_port_ordered() {
        let repo = InMemoryInstanceRepository::new();
        repo.save(&InstanceRecord::new("b", "secret-b", 5002))
            .await
            .unwrap();
        repo.save(&InstanceRecord::new("a", "secret-a", 5000))
            .await
            .unwrap();
        repo.save(&InstanceRecord::new("c", "secret-c", 5001))
            .await
            .unwrap();

        let ports: Vec<u16> = repo.list_all().await.unwrap().iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![5000, 5001, 5002]);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn secondary_lookups_match_one_record() {
        let repo = InMemoryInstanceRepository::new();
        let mut record = InstanceRecord::new("primary", "12345:secret", 5000);
        record.successor_url = "http://127.0.0.1:5001/signal".to_string();
        repo.save(&record).await.unwrap();

        assert_eq!(
            repo.find_by_secret("12345:secret").await.unwrap().unwrap().identity,
            "primary"
        );
        assert_eq!(
            repo.find_by_successor_url("http://127.0.0.1:5001/signal")
                .await
                .unwrap()
                .unwrap()
                .identity,
            "primary"
        );
        assert!(repo.find_by_secret("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn override_set_replaces_prior_entry() {
        let repo = InMemoryOverrideRepository::new();
        let target = TargetKey::new("@chat", 7);
        repo.set(&Override::new(target.clone(), vec!["x".to_string()], 1))
            .await
            .unwrap();
        repo.set(&Override::new(target.clone(), vec!["y".to_string()], 2))
            .await
            .unwrap();

        let live = repo.get(&target).await.unwrap().unwrap();
        assert_eq!(live.items, vec!["y".to_string()]);
        assert_eq!(live.created_by, 2);

        repo.delete(&target).await.unwrap();
        assert!(repo.get(&target).await.unwrap().is_none());
    }
}
