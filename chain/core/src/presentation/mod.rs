// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! Presentation layer: the per-instance HTTP signal listener.

pub mod api;
