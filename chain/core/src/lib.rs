// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # chainreact core
//!
//! Orchestrates a ring of message-bus instances that react to inbound
//! events in a deterministic, coordinated chain. Each instance polls
//! its own event stream, applies a seed-derived reaction item, and
//! nudges its successor over HTTP.
//!
//! Layers:
//! - `domain`: records, packs, overrides, repository and transport
//!   contracts, configuration
//! - `application`: topology, assignment, lifecycle, management
//!   commands
//! - `infrastructure`: in-memory and sled storage, the signal
//!   client, the default transport
//! - `presentation`: the per-instance signal listener

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
