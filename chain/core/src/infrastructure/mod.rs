// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer: storage implementations, the outbound signal
//! client, and the default transport.

pub mod repositories;
pub mod signal;
pub mod sled_store;
pub mod transport;
