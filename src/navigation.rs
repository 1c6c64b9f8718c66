//! Modal navigation state machine.
//!
//! The single owner of all panel-session state: the active command tree
//! view, the menu stack (breadcrumb), the mode, and the search/filter
//! queries. Keyboard semantics come in as `NavEvent`s; every transition is
//! `handle(event) -> Vec<Effect>`, so the machine is testable without a
//! live UI and the host stays a thin translation layer (key codes in,
//! effects out).
//!
//! Async results from the app/window catalogs are applied through
//! `apply_app_results` / `apply_window_results`. Each fetch carries a
//! generation token minted at request time; deliveries are discarded when
//! the token is stale or the requesting mode is no longer active. That
//! guard is the only race-correctness requirement in the crate - the user
//! can cancel out of a mode before background work finishes.

use tracing::debug;

use crate::app_catalog::AppInfo;
use crate::commands::{flatten, CommandEntry, CommandMap, FlatCommand};
use crate::search;
use crate::window_catalog::WindowInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Command,
    Search,
    AppLaunch,
    WindowSwitch,
}

/// Keyboard semantics, already decoded by the view layer.
#[derive(Debug, Clone, PartialEq)]
pub enum NavEvent {
    /// Single printable character in Command mode.
    Key(char),
    /// Activate the current selection (Return).
    Activate,
    /// One level up (Backspace); closes the panel at root.
    Back,
    /// Leave the current mode (Escape); closes the panel in Command mode.
    Cancel,
    /// Enter command search.
    EnterSearch,
    /// The active mode's query/filter text changed.
    QueryChanged(String),
    /// Move the selection by a signed offset, wrapping.
    MoveSelection(i32),
}

/// Side effects the host must carry out after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Execute(String),
    LaunchApp(String),
    FocusWindow(i64),
    ClosePanel,
    FetchApps { token: u64 },
    FetchWindows { token: u64 },
}

/// Keys that switch modes from the root menu. They shadow same-keyed root
/// entries, matching the overlay's fixed bindings.
const APP_MODE_KEY: char = 'a';
const WINDOW_MODE_KEY: char = 'w';

pub struct Navigator {
    root: CommandMap,
    flat: Vec<FlatCommand>,

    mode: Mode,
    menu_stack: Vec<(String, CommandMap)>,
    current_items: CommandMap,
    selected_index: Option<usize>,

    search_query: String,
    search_results: Vec<FlatCommand>,

    apps: Vec<AppInfo>,
    app_query: String,
    windows: Vec<WindowInfo>,
    window_query: String,

    /// Generation token for async fetches; deliveries must match.
    request_token: u64,
}

impl Navigator {
    pub fn new(root: CommandMap) -> Self {
        let flat = flatten(&root);
        let current_items = root.clone();
        Navigator {
            root,
            flat,
            mode: Mode::Command,
            menu_stack: Vec::new(),
            current_items,
            selected_index: None,
            search_query: String::new(),
            search_results: Vec::new(),
            apps: Vec::new(),
            app_query: String::new(),
            windows: Vec::new(),
            window_query: String::new(),
            request_token: 0,
        }
    }

    /// Reset for a fresh panel session: Command mode, empty stack, root
    /// items. Called every time the panel is shown.
    pub fn show(&mut self) {
        self.mode = Mode::Command;
        self.menu_stack.clear();
        self.current_items = self.root.clone();
        self.selected_index = None;
        self.search_query.clear();
        self.search_results.clear();
        self.apps.clear();
        self.app_query.clear();
        self.windows.clear();
        self.window_query.clear();
    }

    /// Replace the root tree (after a reload) and rebuild the flat index.
    pub fn set_root(&mut self, root: CommandMap) {
        self.flat = flatten(&root);
        self.root = root;
        self.show();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn current_items(&self) -> &CommandMap {
        &self.current_items
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn search_results(&self) -> &[FlatCommand] {
        &self.search_results
    }

    /// Menu stack labels joined for display; empty at root.
    pub fn breadcrumb(&self) -> String {
        self.menu_stack
            .iter()
            .map(|(label, _)| label.as_str())
            .collect::<Vec<_>>()
            .join(" > ")
    }

    /// Apps passing the current filter.
    pub fn visible_apps(&self) -> Vec<&AppInfo> {
        let query = self.app_query.to_lowercase();
        self.apps
            .iter()
            .filter(|a| query.is_empty() || a.name.to_lowercase().contains(&query))
            .collect()
    }

    /// Windows passing the current filter (title or app name).
    pub fn visible_windows(&self) -> Vec<&WindowInfo> {
        let query = self.window_query.to_lowercase();
        self.windows
            .iter()
            .filter(|w| {
                query.is_empty()
                    || w.title.to_lowercase().contains(&query)
                    || w.app.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn handle(&mut self, event: NavEvent) -> Vec<Effect> {
        match self.mode {
            Mode::Command => self.handle_command(event),
            Mode::Search => self.handle_search(event),
            Mode::AppLaunch => self.handle_app(event),
            Mode::WindowSwitch => self.handle_window(event),
        }
    }

    // ========================================================================
    // Command mode
    // ========================================================================

    fn handle_command(&mut self, event: NavEvent) -> Vec<Effect> {
        match event {
            NavEvent::Key(c) => {
                let c = c.to_ascii_lowercase();
                if self.menu_stack.is_empty() {
                    if c == APP_MODE_KEY {
                        return self.enter_app_mode();
                    }
                    if c == WINDOW_MODE_KEY {
                        return self.enter_window_mode();
                    }
                }
                let key = c.to_string();
                match self.current_items.get(&key).cloned() {
                    Some(entry) => self.select_entry(entry),
                    None => Vec::new(),
                }
            }
            NavEvent::Activate => match self.selected_entry() {
                Some(entry) => self.select_entry(entry),
                None => Vec::new(),
            },
            NavEvent::Back => {
                if let Some((_, items)) = self.menu_stack.pop() {
                    self.current_items = items;
                    self.selected_index = None;
                    Vec::new()
                } else {
                    vec![Effect::ClosePanel]
                }
            }
            NavEvent::Cancel => vec![Effect::ClosePanel],
            NavEvent::EnterSearch => {
                self.mode = Mode::Search;
                self.search_query.clear();
                self.search_results.clear();
                self.selected_index = None;
                Vec::new()
            }
            NavEvent::MoveSelection(delta) => {
                let len = self.current_items.len();
                self.selected_index = step_selection(self.selected_index, delta, len);
                Vec::new()
            }
            NavEvent::QueryChanged(_) => Vec::new(),
        }
    }

    fn selected_entry(&self) -> Option<CommandEntry> {
        let index = self.selected_index?;
        self.current_items.values().nth(index).cloned()
    }

    fn select_entry(&mut self, entry: CommandEntry) -> Vec<Effect> {
        match entry {
            CommandEntry::Action { command, .. } => {
                vec![Effect::Execute(command), Effect::ClosePanel]
            }
            CommandEntry::Submenu { title, children } => {
                let previous = std::mem::replace(&mut self.current_items, children);
                self.menu_stack.push((title, previous));
                self.selected_index = None;
                Vec::new()
            }
        }
    }

    // ========================================================================
    // Search mode
    // ========================================================================

    fn handle_search(&mut self, event: NavEvent) -> Vec<Effect> {
        match event {
            NavEvent::QueryChanged(query) => {
                self.search_results = search::search(&self.flat, &query);
                self.search_query = query;
                self.selected_index = if self.search_results.is_empty() {
                    None
                } else {
                    Some(0)
                };
                Vec::new()
            }
            NavEvent::Activate => {
                let Some(index) = self.selected_index else {
                    return Vec::new();
                };
                match self.search_results.get(index) {
                    Some(cmd) => vec![Effect::Execute(cmd.command.clone()), Effect::ClosePanel],
                    None => Vec::new(),
                }
            }
            NavEvent::Cancel | NavEvent::Back => {
                // currentItems was never touched while searching
                self.mode = Mode::Command;
                self.search_query.clear();
                self.search_results.clear();
                self.selected_index = None;
                Vec::new()
            }
            NavEvent::MoveSelection(delta) => {
                let len = self.search_results.len();
                self.selected_index = step_selection(self.selected_index, delta, len);
                Vec::new()
            }
            NavEvent::Key(_) | NavEvent::EnterSearch => Vec::new(),
        }
    }

    // ========================================================================
    // AppLaunch mode
    // ========================================================================

    fn enter_app_mode(&mut self) -> Vec<Effect> {
        self.mode = Mode::AppLaunch;
        self.apps.clear();
        self.app_query.clear();
        self.selected_index = None;
        self.request_token += 1;
        debug!(token = self.request_token, "Entering app mode");
        vec![Effect::FetchApps {
            token: self.request_token,
        }]
    }

    /// Apply an async app delivery. Discarded unless the token matches the
    /// most recent request and AppLaunch is still the active mode.
    pub fn apply_app_results(&mut self, token: u64, apps: Vec<AppInfo>) {
        if self.mode != Mode::AppLaunch || token != self.request_token {
            debug!(token, "Discarding stale app results");
            return;
        }
        self.apps = apps;
        self.selected_index = if self.visible_apps().is_empty() {
            None
        } else {
            Some(0)
        };
    }

    fn handle_app(&mut self, event: NavEvent) -> Vec<Effect> {
        match event {
            NavEvent::QueryChanged(query) => {
                self.app_query = query;
                self.selected_index = if self.visible_apps().is_empty() {
                    None
                } else {
                    Some(0)
                };
                Vec::new()
            }
            NavEvent::Activate => {
                let Some(index) = self.selected_index else {
                    return Vec::new();
                };
                match self.visible_apps().get(index) {
                    Some(app) => {
                        let name = app.name.clone();
                        vec![Effect::LaunchApp(name), Effect::ClosePanel]
                    }
                    None => Vec::new(),
                }
            }
            NavEvent::Cancel | NavEvent::Back => self.exit_async_mode(),
            NavEvent::MoveSelection(delta) => {
                let len = self.visible_apps().len();
                self.selected_index = step_selection(self.selected_index, delta, len);
                Vec::new()
            }
            NavEvent::Key(_) | NavEvent::EnterSearch => Vec::new(),
        }
    }

    // ========================================================================
    // WindowSwitch mode
    // ========================================================================

    fn enter_window_mode(&mut self) -> Vec<Effect> {
        self.mode = Mode::WindowSwitch;
        self.windows.clear();
        self.window_query.clear();
        self.selected_index = None;
        self.request_token += 1;
        debug!(token = self.request_token, "Entering window mode");
        vec![Effect::FetchWindows {
            token: self.request_token,
        }]
    }

    /// Apply an async window delivery under the same staleness guard as
    /// `apply_app_results`.
    pub fn apply_window_results(&mut self, token: u64, windows: Vec<WindowInfo>) {
        if self.mode != Mode::WindowSwitch || token != self.request_token {
            debug!(token, "Discarding stale window results");
            return;
        }
        self.windows = windows;
        self.selected_index = if self.visible_windows().is_empty() {
            None
        } else {
            Some(0)
        };
    }

    fn handle_window(&mut self, event: NavEvent) -> Vec<Effect> {
        match event {
            NavEvent::QueryChanged(query) => {
                self.window_query = query;
                self.selected_index = if self.visible_windows().is_empty() {
                    None
                } else {
                    Some(0)
                };
                Vec::new()
            }
            NavEvent::Activate => {
                let Some(index) = self.selected_index else {
                    return Vec::new();
                };
                match self.visible_windows().get(index) {
                    Some(window) => {
                        let id = window.id;
                        vec![Effect::FocusWindow(id), Effect::ClosePanel]
                    }
                    None => Vec::new(),
                }
            }
            NavEvent::Cancel | NavEvent::Back => self.exit_async_mode(),
            NavEvent::MoveSelection(delta) => {
                let len = self.visible_windows().len();
                self.selected_index = step_selection(self.selected_index, delta, len);
                Vec::new()
            }
            NavEvent::Key(_) | NavEvent::EnterSearch => Vec::new(),
        }
    }

    /// Back to Command mode at the root view (async modes only start
    /// there, so current_items is already the root).
    fn exit_async_mode(&mut self) -> Vec<Effect> {
        self.mode = Mode::Command;
        self.selected_index = None;
        Vec::new()
    }
}

/// Wrapping selection step over `len` entries; `None` selects the first
/// (or last, stepping backwards) entry.
fn step_selection(current: Option<usize>, delta: i32, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let base = match current {
        Some(index) => index as i64,
        None if delta >= 0 => -1,
        None => 0,
    };
    Some((base + delta as i64).rem_euclid(len) as usize)
}
