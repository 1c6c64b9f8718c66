//! Command-line front end.
//!
//! Drives the library the way an overlay host would: load and resolve the
//! command tree, search it, enumerate apps and windows, and dispatch a
//! command by key path. Useful both as a shell integration surface and for
//! inspecting what the panel would show without bringing up any UI.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;

use overlook::app_catalog;
use overlook::commands::{flatten, CommandEntry, CommandMap};
use overlook::config::Config;
use overlook::dispatch::Dispatcher;
use overlook::executor::{ProcessExecutor, SystemExecutor};
use overlook::generators::GeneratorRegistry;
use overlook::window_catalog;
use overlook::{loader, logging, resolver, search};

#[derive(Parser)]
#[command(name = "overlook", about = "Keyboard-driven command tree launcher", version)]
struct Cli {
    /// Config file path (defaults to ~/.config/overlook/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved command tree
    Tree,
    /// Search all commands by label or menu path
    Search {
        query: String,
        /// Emit matches as a JSON array instead of aligned text
        #[arg(long)]
        json: bool,
    },
    /// List launchable applications, most recently used first
    Apps {
        /// Skip the cache and rescan application directories
        #[arg(long)]
        refresh: bool,
    },
    /// List switchable windows
    Windows,
    /// Walk a key path through the tree and dispatch the action
    Exec {
        /// One key per level, e.g. `exec b c`
        keys: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let _guard = logging::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let executor = SystemExecutor;

    match cli.command {
        Command::Tree => {
            let tree = load_tree(&config, &executor);
            print_tree(&tree, 0);
        }
        Command::Search { query, json } => {
            let tree = load_tree(&config, &executor);
            let flat = flatten(&tree);
            let matches = search::search(&flat, &query);
            if json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else {
                for cmd in matches {
                    let path = if cmd.path.is_empty() {
                        String::new()
                    } else {
                        format!("  ({})", cmd.path.join(" > "))
                    };
                    println!("{}  {}{}", cmd.key, cmd.label, path);
                }
            }
        }
        Command::Apps { refresh } => list_apps(config, refresh),
        Command::Windows => list_windows(config),
        Command::Exec { keys } => exec_path(&config, &executor, &keys)?,
    }
    Ok(())
}

fn load_tree(config: &Config, executor: &dyn ProcessExecutor) -> CommandMap {
    let registry = GeneratorRegistry::builtin();
    let tree = loader::load(config, &registry, executor);
    resolver::resolve(tree, executor, config)
}

fn print_tree(menu: &CommandMap, depth: usize) {
    let indent = "  ".repeat(depth);
    for (key, entry) in menu {
        match entry {
            CommandEntry::Action { title, command } => {
                println!("{indent}{key}  {title}  [{command}]");
            }
            CommandEntry::Submenu { title, children } => {
                println!("{indent}{key}  {title}/");
                print_tree(children, depth + 1);
            }
        }
    }
}

fn list_apps(config: Config, refresh: bool) {
    let (tx, rx) = mpsc::channel();
    app_catalog::load_apps(config, Arc::new(SystemExecutor), tx, refresh);

    // print the last delivery; recency arrives with the final one
    let mut latest = Vec::new();
    while let Ok(update) = rx.recv() {
        let is_final = update.is_final;
        latest = update.apps;
        if is_final {
            break;
        }
    }
    info!(count = latest.len(), "Apps enumerated");
    for app in latest {
        match app.last_used {
            Some(ts) => println!("{}  (last used {})", app.name, ts as i64),
            None => println!("{}", app.name),
        }
    }
}

fn list_windows(config: Config) {
    let (tx, rx) = mpsc::channel();
    window_catalog::query_windows(config, Arc::new(SystemExecutor), tx);
    if let Ok(windows) = rx.recv() {
        for w in windows {
            println!("{}  [{}] {}", w.id, w.app, w.title);
        }
    }
}

fn exec_path(
    config: &Config,
    executor: &dyn ProcessExecutor,
    keys: &[String],
) -> anyhow::Result<()> {
    if keys.is_empty() {
        bail!("exec needs at least one key");
    }
    let tree = load_tree(config, executor);
    let mut current = &tree;
    let mut walked = Vec::new();

    for (i, key) in keys.iter().enumerate() {
        let key = key.to_lowercase();
        walked.push(key.clone());
        match current.get(&key) {
            Some(CommandEntry::Action { title, command }) => {
                if i + 1 != keys.len() {
                    bail!("'{}' is an action, not a menu", walked.join(" "));
                }
                info!(title = %title, command = %command, "Dispatching");
                Dispatcher::new(config, executor).execute(command);
                return Ok(());
            }
            Some(CommandEntry::Submenu { children, .. }) => {
                current = children;
            }
            None => bail!("no entry for key path '{}'", walked.join(" ")),
        }
    }
    bail!("'{}' is a menu, give one more key", walked.join(" "))
}
