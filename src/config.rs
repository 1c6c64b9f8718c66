//! Deployment configuration.
//!
//! Identifies the external tools and data paths the engine drives: the
//! shell, the terminal emulator, the window-manager query tool, the
//! metadata and icon-conversion tools, and the files the generators read.
//! Every field has a default so a missing or invalid config file simply
//! yields the stock setup - the overlay never refuses to start over config.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Shell used for background commands, computed titles, and the
    /// interactive terminal wrapper (`shell -c CMD`).
    pub shell: String,
    /// Terminal emulator app name for interactive commands.
    pub terminal: String,
    /// OS "open" mechanism (`open -a Name`, `open -na Term --args ...`).
    pub open_tool: String,
    /// Window-manager query/focus tool (yabai-compatible CLI).
    pub window_tool: String,
    /// Per-file metadata tool used for last-used timestamps (mdls-style).
    pub metadata_tool: String,
    /// Raster conversion tool for icon extraction (sips-style).
    pub icon_tool: String,
    /// Clipboard writer the snippet actions pipe into.
    pub clipboard_tool: String,
    /// Editor invoked by generator edit actions.
    pub editor: String,

    /// Service supervisor list tool (`<tool> list`).
    pub service_tool: String,
    /// Ownership marker; only service lines containing it are ours, and the
    /// display name is the suffix after it.
    pub service_marker: String,

    /// Declarative command tree.
    pub commands_path: String,
    /// Flat snippets file read by the snippets generator.
    pub snippets_file: String,
    /// Directory of workspace definition files.
    pub workspace_dir: String,
    /// Extension (without dot) of workspace files.
    pub workspace_ext: String,
    /// Script invoked with a workspace file path as its sole argument.
    pub workspace_runner: String,

    /// Application directories scanned in priority order (first wins).
    pub app_dirs: Vec<String>,
    /// On-disk app cache (JSON array of AppInfo).
    pub app_cache_path: String,
    /// Icon cache directory (one PNG per sanitized app name).
    pub icon_cache_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            shell: "/bin/sh".to_string(),
            terminal: "ghostty".to_string(),
            open_tool: "/usr/bin/open".to_string(),
            window_tool: "yabai".to_string(),
            metadata_tool: "mdls".to_string(),
            icon_tool: "sips".to_string(),
            clipboard_tool: "pbcopy".to_string(),
            editor: "nvim".to_string(),
            service_tool: "launchctl".to_string(),
            service_marker: "local.".to_string(),
            commands_path: "~/.config/overlook/commands.json".to_string(),
            snippets_file: "~/.config/overlook/snippets.txt".to_string(),
            workspace_dir: "~/.config/overlook/workspaces".to_string(),
            workspace_ext: "ws".to_string(),
            workspace_runner: "~/.local/bin/workspace-open".to_string(),
            app_dirs: vec![
                "/Applications".to_string(),
                "~/Applications".to_string(),
                "/System/Applications".to_string(),
                "/System/Library/CoreServices/Applications".to_string(),
            ],
            app_cache_path: "~/.cache/overlook/apps.json".to_string(),
            icon_cache_dir: "~/.cache/overlook/app-icons".to_string(),
        }
    }
}

impl Config {
    /// Load from the standard location, falling back to defaults on any
    /// failure (missing file, bad JSON).
    pub fn load() -> Config {
        Self::load_from(&default_config_path())
    }

    pub fn load_from(path: &PathBuf) -> Config {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded config");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    pub fn commands_path(&self) -> PathBuf {
        expand(&self.commands_path)
    }

    pub fn snippets_file(&self) -> PathBuf {
        expand(&self.snippets_file)
    }

    pub fn workspace_dir(&self) -> PathBuf {
        expand(&self.workspace_dir)
    }

    pub fn workspace_runner(&self) -> PathBuf {
        expand(&self.workspace_runner)
    }

    pub fn app_dirs(&self) -> Vec<PathBuf> {
        self.app_dirs.iter().map(|d| expand(d)).collect()
    }

    pub fn app_cache_path(&self) -> PathBuf {
        expand(&self.app_cache_path)
    }

    pub fn icon_cache_dir(&self) -> PathBuf {
        expand(&self.icon_cache_dir)
    }
}

fn expand(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".config").join("overlook").join("config.json"))
        .unwrap_or_else(|| std::env::temp_dir().join("overlook-config.json"))
}
