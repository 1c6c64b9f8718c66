//! Computed title resolution.
//!
//! Titles may be computed at load time: a title carrying the `#!sh:`
//! marker has the remainder run through the configured shell, and the
//! trimmed stdout becomes the display title (`"(?)"` when output is
//! empty). Resolution walks the whole tree once, synchronously - load
//! latency grows with the number of computed titles, which is expected to
//! stay small.

use tracing::debug;

use crate::commands::{CommandEntry, CommandMap};
use crate::config::Config;
use crate::executor::ProcessExecutor;

const COMPUTED_TITLE_MARKER: &str = "#!sh:";
const EMPTY_PLACEHOLDER: &str = "(?)";

/// Resolve every computed title in the tree, returning the resolved tree.
pub fn resolve(
    tree: CommandMap,
    executor: &dyn ProcessExecutor,
    config: &Config,
) -> CommandMap {
    tree.into_iter()
        .map(|(key, entry)| (key, resolve_entry(entry, executor, config)))
        .collect()
}

fn resolve_entry(
    entry: CommandEntry,
    executor: &dyn ProcessExecutor,
    config: &Config,
) -> CommandEntry {
    match entry {
        CommandEntry::Action { title, command } => CommandEntry::Action {
            title: resolve_title(title, executor, config),
            command,
        },
        CommandEntry::Submenu { title, children } => CommandEntry::Submenu {
            title: resolve_title(title, executor, config),
            children: resolve(children, executor, config),
        },
    }
}

fn resolve_title(title: String, executor: &dyn ProcessExecutor, config: &Config) -> String {
    let Some(command) = title.strip_prefix(COMPUTED_TITLE_MARKER) else {
        return title;
    };
    debug!(command = command, "Resolving computed title");
    let output = executor.run_sync(&config.shell, &["-c", command]);
    let trimmed = output.trim();
    if trimmed.is_empty() {
        EMPTY_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}
