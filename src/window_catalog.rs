//! Window Catalog - asynchronous query of open windows from the external
//! window manager.
//!
//! Results are transient: re-fetched on every WindowSwitch entry and never
//! cached to disk. Parse failures and missing tools degrade to an empty
//! list, never an error.

use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::executor::ProcessExecutor;

/// Delay before issuing the focus command, for reliable focus hand-off.
const FOCUS_SETTLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: i64,
    pub title: String,
    pub app: String,
    pub space: i64,
}

/// Window entry as emitted by the query tool; unknown fields ignored.
#[derive(Deserialize)]
struct RawWindow {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    app: String,
    #[serde(default)]
    space: i64,
    #[serde(rename = "is-visible", default)]
    is_visible: bool,
    #[serde(rename = "is-minimized", default)]
    is_minimized: bool,
}

/// Query open windows in the background, delivering one result on `tx`.
pub fn query_windows(config: Config, executor: Arc<dyn ProcessExecutor>, tx: Sender<Vec<WindowInfo>>) {
    std::thread::spawn(move || {
        let output = executor.run_sync(&config.window_tool, &["-m", "query", "--windows"]);
        let windows = parse_windows(&output);
        info!(count = windows.len(), "Queried windows");
        let _ = tx.send(windows);
    });
}

/// Keep windows that are visible or not minimized, with a non-empty title.
pub fn parse_windows(output: &str) -> Vec<WindowInfo> {
    let raw: Vec<RawWindow> = match serde_json::from_str(output) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "Window query output unparseable, empty list");
            return Vec::new();
        }
    };
    raw.into_iter()
        .filter(|w| (w.is_visible || !w.is_minimized) && !w.title.is_empty())
        .map(|w| WindowInfo {
            id: w.id,
            title: w.title,
            app: w.app,
            space: w.space,
        })
        .collect()
}

/// Focus a window by id, fire-and-forget with a small settle delay.
pub fn focus_window(config: Config, executor: Arc<dyn ProcessExecutor>, id: i64) {
    std::thread::spawn(move || {
        std::thread::sleep(FOCUS_SETTLE);
        executor.run_sync(
            &config.window_tool,
            &["-m", "window", "--focus", &id.to_string()],
        );
    });
}
