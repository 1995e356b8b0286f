// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! Sled-backed repositories for production runs. One database, one
//! tree per aggregate, documents stored as JSON. Secondary lookups
//! (credential, successor URL) scan the tree; instance counts stay
//! small enough that no secondary index is warranted.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::instance::InstanceRecord;
use crate::domain::pack::{Override, Pack, TargetKey};
use crate::domain::repository::{
    InstanceRepository, OverrideRepository, PackRepository, RepositoryError,
};

const INSTANCES_TREE: &str = "instances";
const PACKS_TREE: &str = "packs";
const OVERRIDES_TREE: &str = "overrides";

/// Handle over one opened sled database, shared by the per-aggregate
/// repositories carved out of it.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
}

impl SledStore {
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        let db = sled::open(path)?;
        info!(path = %path.display(), "opened sled store");
        Ok(Self { db: Arc::new(db) })
    }

    pub fn instances(&self) -> Result<SledInstanceRepository, RepositoryError> {
        Ok(SledInstanceRepository {
            tree: self.db.open_tree(INSTANCES_TREE)?,
        })
    }

    pub fn packs(&self) -> Result<SledPackRepository, RepositoryError> {
        Ok(SledPackRepository {
            tree: self.db.open_tree(PACKS_TREE)?,
        })
    }

    pub fn overrides(&self) -> Result<SledOverrideRepository, RepositoryError> {
        Ok(SledOverrideRepository {
            tree: self.db.open_tree(OVERRIDES_TREE)?,
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, RepositoryError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn scan<T: serde::de::DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>, RepositoryError> {
    let mut out = Vec::new();
    for entry in tree.iter() {
        let (_, value) = entry?;
        out.push(decode(&value)?);
    }
    Ok(out)
}

pub struct SledInstanceRepository {
    tree: sled::Tree,
}

#[async_trait]
impl InstanceRepository for SledInstanceRepository {
    async fn save(&self, record: &InstanceRecord) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec(record)?;
        self.tree.insert(record.identity.as_bytes(), bytes)?;
        self.tree.flush_async().await?;
        Ok(())
    }

    async fn find_by_identity(
        &self,
        identity: &str,
    ) -> Result<Option<InstanceRecord>, RepositoryError> {
        self.tree
            .get(identity.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    async fn find_by_secret(
        &self,
        secret: &str,
    ) -> Result<Option<InstanceRecord>, RepositoryError> {
        let records: Vec<InstanceRecord> = scan(&self.tree)?;
        Ok(records.into_iter().find(|r| r.secret == secret))
    }

    async fn find_by_successor_url(
        &self,
        url: &str,
    ) -> Result<Option<InstanceRecord>, RepositoryError> {
        let records: Vec<InstanceRecord> = scan(&self.tree)?;
        Ok(records.into_iter().find(|r| r.successor_url == url))
    }

    async fn list_all(&self) -> Result<Vec<InstanceRecord>, RepositoryError> {
        let mut records: Vec<InstanceRecord> = scan(&self.tree)?;
        records.sort_by_key(|r| r.port);
        Ok(records)
    }

    async fn delete(&self, identity: &str) -> Result<(), RepositoryError> {
        self.tree.remove(identity.as_bytes())?;
        self.tree.flush_async().await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.tree.len())
    }
}

pub struct SledPackRepository {
    tree: sled::Tree,
}

#[async_trait]
impl PackRepository for SledPackRepository {
    async fn save(&self, pack: &Pack) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec(pack)?;
        self.tree.insert(pack.name.as_bytes(), bytes)?;
        self.tree.flush_async().await?;
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Pack>, RepositoryError> {
        self.tree
            .get(name.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    async fn list_all(&self) -> Result<Vec<Pack>, RepositoryError> {
        // Keys are the pack names, so tree iteration order is already
        // name-ascending.
        scan(&self.tree)
    }

    async fn delete(&self, name: &str) -> Result<bool, RepositoryError> {
        let removed = self.tree.remove(name.as_bytes())?.is_some();
        self.tree.flush_async().await?;
        Ok(removed)
    }
}

pub struct SledOverrideRepository {
    tree: sled::Tree,
}

#[async_trait]
impl OverrideRepository for SledOverrideRepository {
    async fn set(&self, entry: &Override) -> Result<(), RepositoryError> {
        let key = entry.target.storage_key();
        let bytes = serde_json::to_vec(entry)?;
        // Delete-then-insert keeps at most one live entry per target.
        self.tree.remove(key.as_bytes())?;
        self.tree.insert(key.as_bytes(), bytes)?;
        self.tree.flush_async().await?;
        Ok(())
    }

    async fn get(&self, target: &TargetKey) -> Result<Option<Override>, RepositoryError> {
        self.tree
            .get(target.storage_key().as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    async fn delete(&self, target: &TargetKey) -> Result<(), RepositoryError> {
        self.tree.remove(target.storage_key().as_bytes())?;
        self.tree.flush_async().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, SledStore) {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn instance_round_trip_and_scan_lookups() {
        let (_dir, store) = open_store();
        let repo = store.instances().unwrap();

        let record = InstanceRecord::new("primary", "12345:secret", 5000);
        repo.save(&record).await.unwrap();
        repo.save(&InstanceRecord::new("clone_1", "67890:secret", 5001))
            .await
            .unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(
            repo.find_by_secret("12345:secret").await.unwrap().unwrap().identity,
            "primary"
        );

        repo.delete("primary").await.unwrap();
        assert!(repo.find_by_identity("primary").await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pack_listing_is_name_ordered() {
        let (_dir, store) = open_store();
        let repo = store.packs().unwrap();

        for name in ["zoo", "alpha", "mid"] {
            repo.save(&Pack::new(name, vec!["x".to_string()])).await.unwrap();
        }
        let names: Vec<String> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zoo"]);

        assert!(repo.delete("mid").await.unwrap());
        assert!(!repo.delete("mid").await.unwrap());
    }

    #[tokio::test]
    async fn overrides_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let target = TargetKey::new("@chat", 42);
        {
            let store = SledStore::open(dir.path()).unwrap();
            let repo = store.overrides().unwrap();
            repo.set(&Override::new(target.clone(), vec!["z".to_string()], 9))
                .await
                .unwrap();
        }

        let store = SledStore::open(dir.path()).unwrap();
        let repo = store.overrides().unwrap();
        let live = repo.get(&target).await.unwrap().unwrap();
        assert_eq!(live.items, vec!["z".to_string()]);
    }
}
