//! Command dispatch.
//!
//! Classifies a final command string as interactive (editors, pagers,
//! monitors - anything that needs a live terminal) or background, then
//! spawns it accordingly: interactive commands get a detached terminal
//! emulator wrapping `shell -c`, background commands run straight through
//! the shell with output discarded. Both paths are fire-and-forget.

use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

use crate::config::Config;
use crate::executor::ProcessExecutor;

/// Interactive-program patterns, kept as plain data so the list is
/// testable and extensible without touching dispatch logic.
pub const INTERACTIVE_PATTERNS: &[&str] = &[
    r"^n?vim\s",
    r"^v\s",
    r"^v$",
    r"&&\s*v$",
    r"&&\s*v\s",
    r"^htop",
    r"^less\s",
    r"^man\s",
    r"^cmus",
    r"^ytdl$",
    r"^ytdl\s",
];

fn interactive_regexes() -> &'static Vec<Regex> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        INTERACTIVE_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("valid interactive pattern"))
            .collect()
    })
}

/// True when `command` should run in a visible terminal session.
pub fn needs_terminal(command: &str) -> bool {
    interactive_regexes().iter().any(|re| re.is_match(command))
}

/// Executes resolved command strings and app/window intents through the
/// configured tools.
pub struct Dispatcher<'a> {
    config: &'a Config,
    executor: &'a dyn ProcessExecutor,
}

impl<'a> Dispatcher<'a> {
    pub fn new(config: &'a Config, executor: &'a dyn ProcessExecutor) -> Self {
        Dispatcher { config, executor }
    }

    /// Run a command string, choosing interactive vs. background spawn.
    pub fn execute(&self, command: &str) {
        if needs_terminal(command) {
            info!(command = command, "Executing in terminal");
            self.executor.spawn_detached(
                &self.config.open_tool,
                &[
                    "-na",
                    &self.config.terminal,
                    "--args",
                    "-e",
                    &self.config.shell,
                    "-c",
                    command,
                ],
            );
        } else {
            info!(command = command, "Executing in background");
            self.executor
                .spawn_detached(&self.config.shell, &["-c", command]);
        }
    }

    /// Open an application by name through the OS open mechanism.
    pub fn launch_app(&self, name: &str) {
        info!(app = name, "Launching app");
        self.executor
            .spawn_detached(&self.config.open_tool, &["-a", name]);
    }
}
