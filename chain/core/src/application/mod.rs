// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! Application layer: chain topology, deterministic assignment,
//! lifecycle orchestration, and the management command surface.

pub mod assignment;
pub mod commands;
pub mod lifecycle;
pub mod ports;
pub mod topology;
pub(crate) mod worker;
