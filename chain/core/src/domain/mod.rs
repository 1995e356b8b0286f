// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod config;
pub mod instance;
pub mod pack;
pub mod repository;
pub mod transport;
