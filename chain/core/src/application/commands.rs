// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Management Commands
//!
//! Text-command surface exposed through the primary instance. Parsing
//! is pure and separately testable; the [`CommandRegistry`] executes
//! parsed commands against the lifecycle manager and keeps the
//! per-sender pending state for the two multi-step flows (pack
//! deletion confirm/cancel, override item entry).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::lifecycle::{InstanceLifecycleManager, LifecycleError};
use crate::domain::instance::PRIMARY_IDENTITY;
use crate::domain::pack::{Override, Pack, TargetKey, MAX_PACK_ITEMS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join { credential: Option<String> },
    Leave { identity: Option<String> },
    SetPack { name: Option<String>, items_raw: String },
    ListPacks,
    ListInstances,
    DeletePack { name: Option<String> },
    Confirm { name: Option<String> },
    Cancel { name: Option<String> },
    SetOverride { link: Option<String> },
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("items must be a bracketed list: [item1, item2, ...]")]
    MissingBrackets,

    #[error("no valid items found in list")]
    EmptyList,

    #[error("too many items (maximum {MAX_PACK_ITEMS})")]
    TooManyItems,

    #[error("unrecognized message link: {0}")]
    BadLink(String),
}

/// Parse a management command out of a message text. `None` means the
/// text is not a command at all (with or without a leading slash).
pub fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    let stripped = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let tokens: Vec<&str> = stripped.split_whitespace().collect();
    let name = *tokens.first()?;

    let arg = |i: usize| tokens.get(i).map(|s| s.to_string());
    Some(match name {
        "help" | "start" => Command::Help,
        "join" => Command::Join { credential: arg(1) },
        "leave" => Command::Leave { identity: arg(1) },
        "set-pack" => Command::SetPack {
            name: arg(1),
            items_raw: tokens.get(2..).unwrap_or(&[]).join(" "),
        },
        "list-packs" => Command::ListPacks,
        "list-instances" => Command::ListInstances,
        "delete-pack" => Command::DeletePack { name: arg(1) },
        "confirm" => Command::Confirm { name: arg(1) },
        "cancel" => Command::Cancel { name: arg(1) },
        "set-override" => Command::SetOverride { link: arg(1) },
        _ => return None,
    })
}

/// Parse a bracketed item list: `[a, b, c]`. Items are trimmed, empty
/// entries dropped, and the pack size cap enforced.
pub fn parse_item_list(input: &str) -> Result<Vec<String>, ParseError> {
    let trimmed = input.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or(ParseError::MissingBrackets)?;

    let items: Vec<String> = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if items.is_empty() {
        return Err(ParseError::EmptyList);
    }
    if items.len() > MAX_PACK_ITEMS {
        return Err(ParseError::TooManyItems);
    }
    Ok(items)
}

/// Resolve a `t.me` message link to a target key.
///
/// `t.me/name/123` addresses a public chat as `@name`;
/// `t.me/c/123456789/123` addresses a private chat, whose internal id
/// carries the `-100` prefix on the wire.
pub fn parse_target_link(link: &str) -> Result<TargetKey, ParseError> {
    let bad = || ParseError::BadLink(link.to_string());

    let path = link
        .split_once("t.me/")
        .map(|(_, rest)| rest)
        .ok_or_else(bad)?;
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let (chat_id, raw_message_id) = match parts.as_slice() {
        ["c", internal, message_id, ..] => (format!("-100{internal}"), *message_id),
        [name, message_id, ..] => (format!("@{}", name.trim_start_matches('@')), *message_id),
        _ => return Err(bad()),
    };

    let message_id: i64 = raw_message_id.parse().map_err(|_| bad())?;
    Ok(TargetKey::new(chat_id, message_id))
}

const HELP_TEXT: &str = "\
Commands:\n\
/join <credential> - add an instance to the chain\n\
/leave <name> - stop and remove an instance\n\
/set-pack <name> [item1, item2, ...] - create or replace a pack\n\
/list-packs - show configured packs\n\
/list-instances - show chain membership and status\n\
/delete-pack <name> - delete a pack (asks for confirmation)\n\
/confirm <name> | /cancel <name> - resolve a pending deletion\n\
/set-override <message link> - pin items to one message\n\
/help - this text";

/// Executes management commands and tracks the per-sender pending
/// state of multi-step flows. Lives on the primary instance's worker.
pub struct CommandRegistry {
    manager: Arc<InstanceLifecycleManager>,
    pending_deletes: DashMap<i64, String>,
    pending_overrides: DashMap<i64, TargetKey>,
}

impl CommandRegistry {
    pub fn new(manager: Arc<InstanceLifecycleManager>) -> Self {
        Self {
            manager,
            pending_deletes: DashMap::new(),
            pending_overrides: DashMap::new(),
        }
    }

    /// Handle one message text from `sender`. Returns `Some(reply)`
    /// when the text was consumed as management traffic, `None` when
    /// it is an ordinary message the worker should react to.
    pub async fn dispatch(&self, sender: i64, text: &str) -> Option<String> {
        // A sender with an override pending supplies the item list as
        // a bare bracketed message.
        if self.pending_overrides.contains_key(&sender) && text.trim().starts_with('[') {
            return Some(self.finish_override(sender, text).await);
        }

        let command = parse_command(text)?;
        Some(self.run(sender, command).await)
    }

    async fn run(&self, sender: i64, command: Command) -> String {
        match command {
            Command::Help => HELP_TEXT.to_string(),
            Command::Join { credential } => self.handle_join(credential).await,
            Command::Leave { identity } => self.handle_leave(identity).await,
            Command::SetPack { name, items_raw } => self.handle_set_pack(name, &items_raw).await,
            Command::ListPacks => self.handle_list_packs().await,
            Command::ListInstances => self.handle_list_instances().await,
            Command::DeletePack { name } => self.handle_delete_pack(sender, name).await,
            Command::Confirm { name } => self.handle_confirm(sender, name).await,
            Command::Cancel { name } => self.handle_cancel(sender, name).await,
            Command::SetOverride { link } => self.handle_set_override(sender, link).await,
        }
    }

    // Boxed: joining starts a worker whose loop dispatches commands,
    // so the future type would otherwise be infinitely recursive.
    fn handle_join(
        &self,
        credential: Option<String>,
    ) -> Pin<Box<dyn Future<Output = String> + Send + '_>> {
        Box::pin(async move {
            let Some(credential) = credential else {
                return "Usage: /join <credential>".to_string();
            };
            // Shape check before any network round-trip.
            if credential.len() < 40 || !credential.contains(':') {
                return "Invalid credential format.".to_string();
            }

            let handle = match self.manager.transport().validate_credential(&credential).await {
                Ok(handle) => handle,
                Err(err) => return format!("Credential validation failed: {err}"),
            };

            let name = match self.next_clone_name().await {
                Ok(name) => name,
                Err(reply) => return reply,
            };

            let record = match self.manager.join(&name, &credential).await {
                Ok(record) => record,
                Err(err) => {
                    warn!(error = %err, "join command failed");
                    return format!("Join failed: {err}");
                }
            };
            if let Err(err) = self.manager.start(&record).await {
                error!(identity = %record.identity, error = %err, "failed to start joined instance");
                return format!(
                    "Instance {} registered but failed to start: {err}",
                    record.identity
                );
            }

            format!(
                "Instance {} (@{}) joined on port {}.\nRunning instances: {}",
                record.identity,
                handle,
                record.port,
                self.manager.running_count()
            )
        })
    }

    /// First free `clone_<n>` name at or above the current count.
    async fn next_clone_name(&self) -> Result<String, String> {
        let instances = self.manager.instances();
        let mut n = match instances.count().await {
            Ok(count) => count,
            Err(err) => {
                error!(error = %err, "failed to count instances");
                return Err(format!("Storage error: {err}"));
            }
        };
        loop {
            let candidate = format!("clone_{n}");
            match instances.find_by_identity(&candidate).await {
                Ok(None) => return Ok(candidate),
                Ok(Some(_)) => n += 1,
                Err(err) => {
                    error!(error = %err, "failed to probe instance name");
                    return Err(format!("Storage error: {err}"));
                }
            }
        }
    }

    async fn handle_leave(&self, identity: Option<String>) -> String {
        let Some(identity) = identity else {
            return "Usage: /leave <instance name>".to_string();
        };

        // Rejections must leave the target untouched, so both are
        // checked before the stop.
        if identity == PRIMARY_IDENTITY {
            return format!(
                "Leave failed: {}",
                LifecycleError::ProtectedInstance(identity)
            );
        }
        match self.manager.instances().find_by_identity(&identity).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return format!("Leave failed: {}", LifecycleError::NotFound(identity))
            }
            Err(err) => return format!("Storage error: {err}"),
        }

        if let Err(err) = self.manager.stop(&identity).await {
            return format!("Stop failed: {err}");
        }
        match self.manager.leave(&identity).await {
            Ok(()) => format!(
                "Instance {identity} left the chain.\nRunning instances: {}",
                self.manager.running_count()
            ),
            Err(err) => format!("Leave failed: {err}"),
        }
    }

    async fn handle_set_pack(&self, name: Option<String>, items_raw: &str) -> String {
        let Some(name) = name else {
            return "Usage: /set-pack <name> [item1, item2, ...]".to_string();
        };

        if items_raw.trim().is_empty() {
            // Bare `/set-pack <name>` shows the current contents.
            return match self.manager.packs().find_by_name(&name).await {
                Ok(Some(pack)) => format!("Pack {}: {}", pack.name, pack.items.join(", ")),
                Ok(None) => format!("Pack {name} does not exist. Usage: /set-pack <name> [item1, item2, ...]"),
                Err(err) => format!("Storage error: {err}"),
            };
        }

        let items = match parse_item_list(items_raw) {
            Ok(items) => items,
            Err(err) => return format!("Invalid item list: {err}"),
        };

        let pack = Pack::new(name.clone(), items);
        if let Err(err) = self.manager.packs().save(&pack).await {
            error!(pack = %name, error = %err, "failed to save pack");
            return format!("Storage error: {err}");
        }
        info!(pack = %name, items = pack.items.len(), "pack saved");

        match self.pack_stats().await {
            Ok((pack_count, item_total)) => format!(
                "Pack {} saved with {} items.\nPacks: {}, items total: {}",
                pack.name,
                pack.items.len(),
                pack_count,
                item_total
            ),
            Err(err) => format!("Pack {} saved with {} items.\n({err})", pack.name, pack.items.len()),
        }
    }

    async fn pack_stats(&self) -> Result<(usize, usize), String> {
        let packs = self
            .manager
            .packs()
            .list_all()
            .await
            .map_err(|err| format!("Storage error: {err}"))?;
        let items = packs.iter().map(|p| p.items.len()).sum();
        Ok((packs.len(), items))
    }

    async fn handle_list_packs(&self) -> String {
        let packs = match self.manager.packs().list_all().await {
            Ok(packs) => packs,
            Err(err) => return format!("Storage error: {err}"),
        };
        if packs.is_empty() {
            return "No packs configured. Instances use the built-in defaults.".to_string();
        }

        let mut lines = vec![format!("Packs ({}):", packs.len())];
        for pack in &packs {
            lines.push(format!(
                "{}: {} ({} items)",
                pack.name,
                pack.items.join(", "),
                pack.items.len()
            ));
        }
        lines.join("\n")
    }

    async fn handle_list_instances(&self) -> String {
        let statuses = match self.manager.statuses().await {
            Ok(statuses) => statuses,
            Err(err) => return format!("Storage error: {err}"),
        };
        if statuses.is_empty() {
            return "No instances registered.".to_string();
        }

        let mut lines = vec![format!(
            "Instances ({}, {} running):",
            statuses.len(),
            self.manager.running_count()
        )];
        for status in &statuses {
            let state = if status.running { "running" } else { "stopped" };
            let successor = if status.record.is_tail() {
                "tail".to_string()
            } else {
                format!("-> {}", status.record.successor_url)
            };
            let pack = self
                .manager
                .assigned_items(&status.record.identity)
                .map(|items| format!(", {} items assigned", items.len()))
                .unwrap_or_default();
            lines.push(format!(
                "{} [{}] port {} {}{}",
                status.record.identity, state, status.record.port, successor, pack
            ));
        }
        lines.join("\n")
    }

    async fn handle_delete_pack(&self, sender: i64, name: Option<String>) -> String {
        let Some(name) = name else {
            return "Usage: /delete-pack <name>".to_string();
        };

        match self.manager.packs().find_by_name(&name).await {
            Ok(Some(_)) => {}
            Ok(None) => return format!("Pack {name} does not exist."),
            Err(err) => return format!("Storage error: {err}"),
        }

        self.pending_deletes.insert(sender, name.clone());
        format!(
            "Delete pack {name}? Running instances will be reassigned.\n/confirm {name} to proceed, /cancel {name} to keep it."
        )
    }

    async fn handle_confirm(&self, sender: i64, name: Option<String>) -> String {
        let Some(pending) = self.pending_deletes.get(&sender).map(|e| e.value().clone()) else {
            return "Nothing pending to confirm.".to_string();
        };
        if let Some(name) = name {
            if name != pending {
                return format!("Pending deletion is for pack {pending}, not {name}.");
            }
        }
        self.pending_deletes.remove(&sender);

        match self.manager.packs().delete(&pending).await {
            Ok(true) => {}
            Ok(false) => return format!("Pack {pending} was already gone."),
            Err(err) => return format!("Storage error: {err}"),
        }
        info!(pack = %pending, "pack deleted");

        let reassigned = match self.manager.reassign_all().await {
            Ok(count) => count,
            Err(err) => {
                error!(error = %err, "reassignment after pack deletion failed");
                return format!("Pack {pending} deleted, but reassignment failed: {err}");
            }
        };
        format!("Pack {pending} deleted. Reassigned {reassigned} running instances.")
    }

    async fn handle_cancel(&self, sender: i64, name: Option<String>) -> String {
        let Some(pending) = self.pending_deletes.get(&sender).map(|e| e.value().clone()) else {
            return "Nothing pending to cancel.".to_string();
        };
        if let Some(name) = name {
            if name != pending {
                return format!("Pending deletion is for pack {pending}, not {name}.");
            }
        }
        self.pending_deletes.remove(&sender);
        format!("Kept pack {pending}.")
    }

    async fn handle_set_override(&self, sender: i64, link: Option<String>) -> String {
        let Some(link) = link else {
            return "Usage: /set-override <message link>".to_string();
        };
        let target = match parse_target_link(&link) {
            Ok(target) => target,
            Err(err) => return format!("{err}"),
        };

        // Clear existing reactions so the override starts clean.
        let cleared = self.clear_reactions(&target).await;
        self.pending_overrides.insert(sender, target.clone());
        format!(
            "Target {target} selected ({cleared} reactions cleared).\nSend the new items as [item1, item2, ...]"
        )
    }

    /// Clear the target's reaction from every running instance.
    /// Returns how many clears succeeded; failures are logged only.
    async fn clear_reactions(&self, target: &TargetKey) -> usize {
        let statuses = match self.manager.statuses().await {
            Ok(statuses) => statuses,
            Err(err) => {
                error!(error = %err, "failed to enumerate instances for reaction clear");
                return 0;
            }
        };

        let mut cleared = 0;
        for status in statuses.iter().filter(|s| s.running) {
            match self
                .manager
                .transport()
                .set_reaction(&status.record.secret, target, None)
                .await
            {
                Ok(()) => cleared += 1,
                Err(err) => warn!(
                    identity = %status.record.identity,
                    target = %target,
                    error = %err,
                    "failed to clear reaction"
                ),
            }
        }
        cleared
    }

    /// Second step of the override flow: store the item list and apply
    /// it immediately, each running instance taking its ring-position
    /// slot.
    async fn finish_override(&self, sender: i64, text: &str) -> String {
        let Some(target) = self.pending_overrides.get(&sender).map(|e| e.value().clone()) else {
            return "No override pending.".to_string();
        };

        let items = match parse_item_list(text) {
            // The pending target survives a malformed list so the
            // sender can retry.
            Err(err) => return format!("Invalid item list: {err}"),
            Ok(items) => items,
        };
        self.pending_overrides.remove(&sender);

        let entry = Override::new(target.clone(), items.clone(), sender);
        if let Err(err) = self.manager.overrides().set(&entry).await {
            error!(target = %target, error = %err, "failed to store override");
            return format!("Storage error: {err}");
        }
        info!(target = %target, items = items.len(), "override stored");

        let applied = self.apply_override(&target, &items).await;
        format!(
            "Override on {target} set to [{}]. Applied by {applied} running instances.",
            items.join(", ")
        )
    }

    /// Apply an override list across the ring: the instance at ring
    /// position `i` takes item `i % len`, matching what workers will
    /// resolve for later events on the same target.
    async fn apply_override(&self, target: &TargetKey, items: &[String]) -> usize {
        let statuses = match self.manager.statuses().await {
            Ok(statuses) => statuses,
            Err(err) => {
                error!(error = %err, "failed to enumerate instances for override apply");
                return 0;
            }
        };

        let mut applied = 0;
        for (position, status) in statuses.iter().enumerate() {
            if !status.running {
                continue;
            }
            let item = &items[position % items.len()];
            match self
                .manager
                .transport()
                .set_reaction(&status.record.secret, target, Some(item))
                .await
            {
                Ok(()) => applied += 1,
                Err(err) => warn!(
                    identity = %status.record.identity,
                    target = %target,
                    error = %err,
                    "failed to apply override reaction"
                ),
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_and_without_slash() {
        assert_eq!(
            parse_command("/join 1234:abcd"),
            Some(Command::Join {
                credential: Some("1234:abcd".to_string())
            })
        );
        assert_eq!(parse_command("list-packs"), Some(Command::ListPacks));
        assert_eq!(parse_command("  /help  "), Some(Command::Help));
        assert_eq!(parse_command("just a message"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn set_pack_keeps_item_remainder_intact() {
        assert_eq!(
            parse_command("/set-pack faces [a, b, c]"),
            Some(Command::SetPack {
                name: Some("faces".to_string()),
                items_raw: "[a, b, c]".to_string()
            })
        );
    }

    #[test]
    fn item_list_trims_and_drops_empties() {
        assert_eq!(
            parse_item_list("[ a , b ,, c ]"),
            Ok(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(parse_item_list("a, b"), Err(ParseError::MissingBrackets));
        assert_eq!(parse_item_list("[ , ]"), Err(ParseError::EmptyList));

        let too_many = format!(
            "[{}]",
            (0..=MAX_PACK_ITEMS).map(|i| i.to_string()).collect::<Vec<_>>().join(",")
        );
        assert_eq!(parse_item_list(&too_many), Err(ParseError::TooManyItems));
    }

    #[test]
    fn target_links_resolve_public_and_private_chats() {
        assert_eq!(
            parse_target_link("https://t.me/somechat/42"),
            Ok(TargetKey::new("@somechat", 42))
        );
        assert_eq!(
            parse_target_link("t.me/c/123456789/17"),
            Ok(TargetKey::new("-100123456789", 17))
        );
        assert!(matches!(
            parse_target_link("https://example.com/somechat/42"),
            Err(ParseError::BadLink(_))
        ));
        assert!(matches!(
            parse_target_link("t.me/somechat/notanumber"),
            Err(ParseError::BadLink(_))
        ));
    }
}
