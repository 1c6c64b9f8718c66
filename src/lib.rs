//! Overlook - command-tree resolution and modal navigation for a
//! keyboard-driven launcher overlay.
//!
//! This library owns everything behind the panel: loading the declarative
//! command tree, expanding generator subtrees from live system state,
//! flattening for search, the app/window catalogs, and the mode-based
//! navigation state machine. Rendering, global hotkeys, and panel chrome
//! live in the host application.

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod generators;
pub mod loader;
pub mod logging;
pub mod navigation;
pub mod resolver;
pub mod search;

// Async data sources for AppLaunch and WindowSwitch modes
pub mod app_catalog;
pub mod window_catalog;
