// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Deterministic Assignment Engine
//!
//! Seed-based selection of a pack and of an item within a pack. No
//! per-event coordination exists between instances: every participant
//! recomputes the same answer from shared durable inputs (identity
//! strings and persisted pack contents).
//!
//! Determinism rests on two fixed algorithms: the FNV-1a 64-bit
//! string hash (reduced mod 2^32) to derive seeds, and ChaCha8 as the
//! generator. ChaCha8's output stream is specified, so selections
//! reproduce across restarts, hosts, and crate upgrades; a
//! language-default hasher or an unpinned generator would not.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::domain::pack::{default_items, Pack};
use crate::domain::repository::{PackRepository, RepositoryError};

/// FNV-1a 64-bit hash. Fixed constants, byte-at-a-time; identical
/// output on every platform and run.
pub fn fnv1a64(input: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for b in input.as_bytes() {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Seed for a selection keyed by `input`, reduced mod 2^32.
fn seed_for(input: &str) -> u64 {
    fnv1a64(input) % (1 << 32)
}

/// Uniform choice over a slice, seeded by `seed_input`.
fn choose<'a, T>(items: &'a [T], seed_input: &str) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed_for(seed_input));
    Some(&items[rng.random_range(0..items.len())])
}

pub struct AssignmentEngine {
    packs: Arc<dyn PackRepository>,
}

impl AssignmentEngine {
    pub fn new(packs: Arc<dyn PackRepository>) -> Self {
        Self { packs }
    }

    /// Pack items assigned to an instance for its entire run.
    ///
    /// Seeded by the instance identity over the name-ordered pack
    /// list. Callers cache the result at startup; it is not
    /// recomputed per event.
    pub async fn pack_for_instance(&self, identity: &str) -> Result<Vec<String>, RepositoryError> {
        let packs = self.packs.list_all().await?;
        Ok(match choose(&packs, identity) {
            Some(pack) => pack.items.clone(),
            None => default_items(),
        })
    }

    /// Pack items chosen for one event, identical for every instance
    /// observing that event.
    pub async fn pack_for_event(&self, event_id: &str) -> Result<Vec<String>, RepositoryError> {
        let packs = self.packs.list_all().await?;
        Ok(match choose(&packs, &format!("event_{event_id}")) {
            Some(pack) => pack.items.clone(),
            None => default_items(),
        })
    }

    /// Item a given instance applies to a given event: drawn from the
    /// event's pack, positioned by the (identity, event) seed so
    /// distinct instances generally land on distinct items of the
    /// same pack.
    pub async fn item_for(&self, identity: &str, event_id: &str) -> Result<String, RepositoryError> {
        let pack = self.pack_for_event(event_id).await?;
        let seed_input = format!("{identity}_{event_id}");
        Ok(match choose(&pack, &seed_input) {
            Some(item) => item.clone(),
            // Empty packs are excluded by the creation invariant;
            // fall back rather than fail if one slips in.
            None => default_items()[0].clone(),
        })
    }

    /// Name of the pack an instance would be assigned, for status
    /// output. `None` means the built-in default list.
    pub async fn pack_name_for_instance(
        &self,
        identity: &str,
    ) -> Result<Option<String>, RepositoryError> {
        let packs: Vec<Pack> = self.packs.list_all().await?;
        Ok(choose(&packs, identity).map(|pack| pack.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a64_known_vectors() {
        // Reference values for the 64-bit FNV-1a parameters.
        assert_eq!(fnv1a64(""), 0xcbf29ce484222325);
        assert_eq!(fnv1a64("a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn seeds_fit_in_32_bits() {
        for input in ["primary", "clone_1", "event_42", "primary_42"] {
            assert!(seed_for(input) < (1 << 32));
        }
    }

    #[test]
    fn choose_is_stable() {
        let items = vec!["a", "b", "c", "d", "e"];
        let first = choose(&items, "some-identity");
        for _ in 0..16 {
            assert_eq!(choose(&items, "some-identity"), first);
        }
        assert!(choose::<&str>(&[], "anything").is_none());
    }
}
