// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Instance Lifecycle Manager
//!
//! Orchestrates instance workers through the state machine
//! `UNREGISTERED -> REGISTERED -> STARTING -> RUNNING -> STOPPING ->
//! REGISTERED` (or `-> UNREGISTERED` on full removal).
//!
//! The manager exclusively owns two pieces of process-wide state:
//! the running set (active credentials; the sole source of truth for
//! "is this instance currently polling", and the cooperative
//! cancellation signal workers observe) and the per-instance pack
//! assignments computed at startup. Lifecycle operations for the same
//! identity are serialized; distinct identities proceed concurrently.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::assignment::AssignmentEngine;
use crate::application::ports::PortAllocator;
use crate::application::topology::{ChainTopology, TopologyError};
use crate::application::worker;
use crate::domain::config::ChainConfig;
use crate::domain::instance::{InstanceRecord, InstanceStatus, PRIMARY_IDENTITY};
use crate::domain::pack::TargetKey;
use crate::domain::repository::{
    InstanceRepository, OverrideRepository, PackRepository, RepositoryError,
};
use crate::domain::transport::{ReactionTransport, TransportError};
use crate::infrastructure::signal::SignalPropagator;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Instance already exists: {0}")]
    AlreadyExists(String),

    #[error("Instance already running: {0}")]
    AlreadyRunning(String),

    #[error("Instance is protected: {0}")]
    ProtectedInstance(String),

    #[error("Instance not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Process-wide set of currently-active credentials, guarded by one
/// lock so every check-then-mutate sequence is atomic.
struct RunningSet {
    inner: Mutex<HashSet<String>>,
}

impl RunningSet {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashSet::new()),
        }
    }

    /// Check-and-insert under a single guard. `false` means the
    /// credential was already active.
    fn try_acquire(&self, secret: &str) -> bool {
        let mut guard = self.inner.lock();
        if guard.contains(secret) {
            return false;
        }
        guard.insert(secret.to_string());
        true
    }

    /// Remove a credential; workers observe this on their next poll.
    fn release(&self, secret: &str) -> bool {
        self.inner.lock().remove(secret)
    }

    fn contains(&self, secret: &str) -> bool {
        self.inner.lock().contains(secret)
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

pub struct InstanceLifecycleManager {
    instances: Arc<dyn InstanceRepository>,
    packs: Arc<dyn PackRepository>,
    overrides: Arc<dyn OverrideRepository>,
    transport: Arc<dyn ReactionTransport>,
    allocator: PortAllocator,
    topology: ChainTopology,
    assignment: AssignmentEngine,
    propagator: SignalPropagator,
    running: RunningSet,
    assignments: DashMap<String, Vec<String>>,
    op_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    host: String,
    poll_interval: Duration,
    start_stagger: Duration,
    primary_credential: Option<String>,
}

impl InstanceLifecycleManager {
    pub fn new(
        config: &ChainConfig,
        instances: Arc<dyn InstanceRepository>,
        packs: Arc<dyn PackRepository>,
        overrides: Arc<dyn OverrideRepository>,
        transport: Arc<dyn ReactionTransport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            allocator: PortAllocator::new(instances.clone(), config.network.port_floor),
            topology: ChainTopology::new(instances.clone(), config.network.host.clone()),
            assignment: AssignmentEngine::new(packs.clone()),
            propagator: SignalPropagator::new(config.worker.signal_timeout_secs),
            running: RunningSet::new(),
            assignments: DashMap::new(),
            op_locks: DashMap::new(),
            host: config.network.host.clone(),
            poll_interval: Duration::from_millis(config.worker.poll_interval_ms),
            start_stagger: Duration::from_millis(config.worker.start_stagger_ms),
            primary_credential: config.primary_credential.clone(),
            instances,
            packs,
            overrides,
            transport,
        })
    }

    /// Serialize lifecycle operations per identity.
    fn op_lock(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.op_locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Register a new instance: validate credential uniqueness,
    /// allocate a port, link into the chain, persist. Does not start
    /// the worker; starting is a separate explicit step.
    pub async fn join(&self, name: &str, secret: &str) -> Result<InstanceRecord, LifecycleError> {
        let lock = self.op_lock(name);
        let _guard = lock.lock().await;

        if self.running.contains(secret) {
            return Err(LifecycleError::AlreadyExists(name.to_string()));
        }
        if self.instances.find_by_secret(secret).await?.is_some() {
            return Err(LifecycleError::AlreadyExists(name.to_string()));
        }
        if self.instances.find_by_identity(name).await?.is_some() {
            return Err(LifecycleError::AlreadyExists(name.to_string()));
        }

        let port = self.allocator.allocate().await?;
        let record = InstanceRecord::new(name, secret, port);
        self.topology.join(&record).await?;
        info!(identity = name, port, "instance joined chain");
        Ok(record)
    }

    /// Start the worker for a registered instance: claim the
    /// credential in the running set, compute the instance's pack
    /// assignment, and spawn the event loop plus its signal listener.
    pub async fn start(self: &Arc<Self>, record: &InstanceRecord) -> Result<(), LifecycleError> {
        let lock = self.op_lock(&record.identity);
        let _guard = lock.lock().await;

        if !self.running.try_acquire(&record.secret) {
            return Err(LifecycleError::AlreadyRunning(record.identity.clone()));
        }

        let items = match self.assignment.pack_for_instance(&record.identity).await {
            Ok(items) => items,
            Err(err) => {
                self.running.release(&record.secret);
                return Err(err.into());
            }
        };
        info!(
            identity = %record.identity,
            items = items.len(),
            "assigned pack to instance"
        );
        self.assignments.insert(record.identity.clone(), items);

        let manager = Arc::clone(self);
        let worker_record = record.clone();
        tokio::spawn(async move {
            worker::run(manager, worker_record).await;
        });
        info!(identity = %record.identity, port = record.port, "instance started");
        Ok(())
    }

    /// Stop a running worker cooperatively. The loop observes the
    /// released credential on its next poll and exits; in-flight
    /// event handling completes.
    pub async fn stop(&self, identity: &str) -> Result<(), LifecycleError> {
        let lock = self.op_lock(identity);
        let _guard = lock.lock().await;

        let record = self
            .instances
            .find_by_identity(identity)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(identity.to_string()))?;

        if self.running.release(&record.secret) {
            info!(identity, "instance stopping");
        } else {
            warn!(identity, "stop requested for instance that was not running");
        }
        self.assignments.remove(identity);
        Ok(())
    }

    /// Remove an instance from the chain and the store. Requires the
    /// instance to be stopped, and refuses the protected primary
    /// before touching any state.
    pub async fn leave(&self, identity: &str) -> Result<(), LifecycleError> {
        let lock = self.op_lock(identity);
        let _guard = lock.lock().await;

        if identity == PRIMARY_IDENTITY {
            return Err(LifecycleError::ProtectedInstance(identity.to_string()));
        }

        let record = self
            .instances
            .find_by_identity(identity)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(identity.to_string()))?;

        if self.running.contains(&record.secret) {
            return Err(LifecycleError::AlreadyRunning(identity.to_string()));
        }

        self.topology.leave(identity).await?;
        Ok(())
    }

    /// Bootstrap: ensure the primary record exists for the configured
    /// credential, then start every persisted instance, staggering
    /// starts to narrow the unprotected port-allocation window.
    pub async fn start_all(self: &Arc<Self>) -> Result<usize, LifecycleError> {
        if let Some(credential) = self.primary_credential.clone() {
            let known = self.instances.find_by_secret(&credential).await?.is_some()
                || self
                    .instances
                    .find_by_identity(PRIMARY_IDENTITY)
                    .await?
                    .is_some();
            if !known {
                info!("primary instance not registered, joining it");
                self.join(PRIMARY_IDENTITY, &credential).await?;
            }
        }

        let records = self.instances.list_all().await?;
        let mut started = 0;
        for record in &records {
            match self.start(record).await {
                Ok(()) => started += 1,
                Err(LifecycleError::AlreadyRunning(identity)) => {
                    warn!(%identity, "skipping already-running instance")
                }
                Err(err) => error!(identity = %record.identity, error = %err, "failed to start instance"),
            }
            tokio::time::sleep(self.start_stagger).await;
        }
        info!(started, total = records.len(), "instance bootstrap complete");
        Ok(started)
    }

    /// Stop every running worker (shutdown path).
    pub async fn stop_all(&self) {
        match self.instances.list_all().await {
            Ok(records) => {
                for record in records {
                    if self.running.release(&record.secret) {
                        info!(identity = %record.identity, "instance stopping");
                    }
                    self.assignments.remove(&record.identity);
                }
            }
            Err(err) => error!(error = %err, "failed to enumerate instances for shutdown"),
        }
    }

    /// Recompute the pack assignment of every running instance.
    /// Triggered by pack deletion; a run with no active instances is
    /// a harmless no-op. Already-committed per-event selections are
    /// not revisited.
    pub async fn reassign_all(&self) -> Result<usize, RepositoryError> {
        let identities: Vec<String> = self
            .assignments
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for identity in &identities {
            let items = self.assignment.pack_for_instance(identity).await?;
            info!(identity = %identity, items = items.len(), "reassigned pack");
            self.assignments.insert(identity.clone(), items);
        }
        Ok(identities.len())
    }

    /// Resolve the reaction item for (instance, event): a live
    /// override bypasses the assignment engine entirely, with each
    /// instance taking its ring-position slot in the override list.
    pub async fn resolve_item(
        &self,
        identity: &str,
        target: &TargetKey,
        event_id: &str,
    ) -> Result<String, LifecycleError> {
        if let Some(entry) = self.overrides.get(target).await? {
            if !entry.items.is_empty() {
                let position = self.ring_position(identity).await?;
                return Ok(entry.items[position % entry.items.len()].clone());
            }
        }
        Ok(self.assignment.item_for(identity, event_id).await?)
    }

    /// Position of an instance in the port-ordered ring (0 if unknown).
    async fn ring_position(&self, identity: &str) -> Result<usize, RepositoryError> {
        let records = self.instances.list_all().await?;
        Ok(records
            .iter()
            .position(|record| record.identity == identity)
            .unwrap_or(0))
    }

    /// Forward the chain: look up the instance's current successor
    /// (re-read so topology relinks are honored) and dispatch a
    /// detached signal toward it.
    pub async fn forward_signal(&self, identity: &str) -> Result<(), LifecycleError> {
        let record = self
            .instances
            .find_by_identity(identity)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(identity.to_string()))?;
        self.propagator.notify(identity, &record.successor_url);
        Ok(())
    }

    /// Running/stopped view across the store and the running set.
    pub async fn statuses(&self) -> Result<Vec<InstanceStatus>, RepositoryError> {
        let records = self.instances.list_all().await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let running = self.running.contains(&record.secret);
                InstanceStatus { record, running }
            })
            .collect())
    }

    /// Whether a credential is active. Worker loops poll this as
    /// their cooperative cancellation signal.
    pub fn is_running(&self, secret: &str) -> bool {
        self.running.contains(secret)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// The pack items assigned to a running instance, if any.
    pub fn assigned_items(&self, identity: &str) -> Option<Vec<String>> {
        self.assignments.get(identity).map(|entry| entry.value().clone())
    }

    pub fn instances(&self) -> Arc<dyn InstanceRepository> {
        self.instances.clone()
    }

    pub fn packs(&self) -> Arc<dyn PackRepository> {
        self.packs.clone()
    }

    pub fn overrides(&self) -> Arc<dyn OverrideRepository> {
        self.overrides.clone()
    }

    pub fn transport(&self) -> Arc<dyn ReactionTransport> {
        self.transport.clone()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
