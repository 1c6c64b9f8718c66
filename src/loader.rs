//! Command tree loading.
//!
//! Parses the declarative JSON command configuration into a `CommandMap`,
//! dispatching `generator:NAME` values to the generator registry. A
//! missing or unparseable file yields an empty root tree - the overlay
//! shows nothing rather than crashing.
//!
//! Config shape, per level:
//! - `"_desc"` (and any `_`-prefixed key) is metadata, not a command
//! - `key: [title, "command string"]` - action
//! - `key: [title, ["argv", "..."]]` - action, argv joined with spaces
//! - `key: { "_desc": "Title", ... }` - submenu, recursively parsed;
//!   a submenu that parses to zero children is dropped entirely
//! - `key: "generator:NAME"` - dynamic subtree from the registry

use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

use crate::commands::{CommandEntry, CommandMap};
use crate::config::Config;
use crate::executor::ProcessExecutor;
use crate::generators::GeneratorRegistry;

const GENERATOR_PREFIX: &str = "generator:";
const METADATA_PREFIX: char = '_';
const DESC_FIELD: &str = "_desc";

/// Load the root tree from the configured commands file.
pub fn load(
    config: &Config,
    registry: &GeneratorRegistry,
    executor: &dyn ProcessExecutor,
) -> CommandMap {
    load_file(&config.commands_path(), config, registry, executor)
}

pub fn load_file(
    path: &Path,
    config: &Config,
    registry: &GeneratorRegistry,
    executor: &dyn ProcessExecutor,
) -> CommandMap {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Commands file unreadable, empty tree");
            return CommandMap::new();
        }
    };
    let root: Value = match serde_json::from_str(&contents) {
        Ok(root) => root,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Commands file invalid, empty tree");
            return CommandMap::new();
        }
    };
    let tree = parse_menu(&root, config, registry, executor);
    info!(path = %path.display(), entries = tree.len(), "Loaded command tree");
    tree
}

/// Parse one level of the config object into a `CommandMap`.
///
/// Keys are stored lowercase; on a case-insensitive collision the first
/// entry wins, keeping the per-map uniqueness invariant.
pub fn parse_menu(
    value: &Value,
    config: &Config,
    registry: &GeneratorRegistry,
    executor: &dyn ProcessExecutor,
) -> CommandMap {
    let mut result = CommandMap::new();
    let Some(object) = value.as_object() else {
        return result;
    };
    for (key, entry_value) in object {
        if key.starts_with(METADATA_PREFIX) {
            continue;
        }
        let Some(entry) = parse_entry(entry_value, config, registry, executor) else {
            continue;
        };
        let normalized = key.to_lowercase();
        if result.contains_key(&normalized) {
            warn!(key = %key, "Duplicate key (case-insensitive), keeping first entry");
            continue;
        }
        result.insert(normalized, entry);
    }
    result
}

fn parse_entry(
    value: &Value,
    config: &Config,
    registry: &GeneratorRegistry,
    executor: &dyn ProcessExecutor,
) -> Option<CommandEntry> {
    // [title, command] or [title, [argv...]]
    if let Some(arr) = value.as_array() {
        if arr.len() < 2 {
            return None;
        }
        let title = arr[0].as_str()?;
        if let Some(command) = arr[1].as_str() {
            return Some(CommandEntry::action(title, command));
        }
        if let Some(argv) = arr[1].as_array() {
            let parts: Vec<&str> = argv.iter().filter_map(|v| v.as_str()).collect();
            if parts.len() == argv.len() {
                return Some(CommandEntry::action(title, parts.join(" ")));
            }
        }
        return None;
    }

    // Nested object: submenu titled by _desc
    if let Some(object) = value.as_object() {
        let title = object
            .get(DESC_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or("+");
        let children = parse_menu(value, config, registry, executor);
        if children.is_empty() {
            return None;
        }
        return Some(CommandEntry::submenu(title, children));
    }

    // Generator reference
    if let Some(text) = value.as_str() {
        if let Some(name) = text.strip_prefix(GENERATOR_PREFIX) {
            return registry.generate(name, executor, config);
        }
    }

    None
}
