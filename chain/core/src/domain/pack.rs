// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Packs and Overrides
//!
//! A pack is a named, ordered list of reaction items, replaced
//! wholesale by management commands. An override pins a specific item
//! list to one target message and takes precedence over the
//! assignment engine until explicitly replaced or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Built-in fallback items used when no packs are configured.
pub const DEFAULT_ITEMS: [&str; 3] = ["\u{2764}\u{fe0f}\u{200d}\u{1f525}", "\u{1f970}", "\u{26a1}"];

/// Upper bound on items per pack and per override.
pub const MAX_PACK_ITEMS: usize = 20;

/// The built-in default item list as owned strings.
pub fn default_items() -> Vec<String> {
    DEFAULT_ITEMS.iter().map(|s| s.to_string()).collect()
}

/// Named, ordered list of reaction items. Names are unique; items are
/// non-empty after creation and duplicates are permitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pack {
    pub name: String,
    pub items: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Pack {
    pub fn new(name: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            name: name.into(),
            items,
            created_at: Utc::now(),
        }
    }
}

/// One message in one chat, the key an override is pinned to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetKey {
    pub chat_id: String,
    pub message_id: i64,
}

impl TargetKey {
    pub fn new(chat_id: impl Into<String>, message_id: i64) -> Self {
        Self {
            chat_id: chat_id.into(),
            message_id,
        }
    }

    /// Stable storage key for the (chat, message) pair.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.chat_id, self.message_id)
    }
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.message_id)
    }
}

/// Per-target item-list override. At most one live override exists per
/// target; inserting a new one deletes the prior entry. Overrides
/// never expire automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub target: TargetKey,
    pub items: Vec<String>,
    /// User that requested the override through the management flow.
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

impl Override {
    pub fn new(target: TargetKey, items: Vec<String>, created_by: i64) -> Self {
        Self {
            target,
            items,
            created_by,
            created_at: Utc::now(),
        }
    }
}
