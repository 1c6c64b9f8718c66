//! Dynamic command generators.
//!
//! A generator synthesizes one `Submenu` from live external state instead
//! of static configuration: supervised background services, a flat
//! snippets file, workspace definition files. The loader dispatches to the
//! registry when it sees a `generator:NAME` value.
//!
//! Generators never fail. Every error path (missing file, absent
//! directory, tool not installed, unparseable output) degrades to a
//! minimal, still-valid submenu so the overlay always has something to
//! show.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::commands::{assign_key, CommandEntry, CommandMap};
use crate::config::Config;
use crate::executor::ProcessExecutor;

/// Glyphs suffixed to service titles for running / stopped state.
const RUNNING_GLYPH: char = '\u{25CF}'; // ●
const STOPPED_GLYPH: char = '\u{25CB}'; // ○

pub type GeneratorFn =
    Box<dyn Fn(&dyn ProcessExecutor, &Config) -> CommandEntry + Send + Sync>;

/// Name-keyed registry of generator functions (strategy pattern), so each
/// generator is independently testable and new ones plug in without
/// touching the loader.
pub struct GeneratorRegistry {
    generators: HashMap<String, GeneratorFn>,
}

impl GeneratorRegistry {
    pub fn empty() -> Self {
        GeneratorRegistry {
            generators: HashMap::new(),
        }
    }

    /// Registry with the built-in generators.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("services", Box::new(services_menu));
        registry.register("snippets", Box::new(snippets_menu));
        registry.register("workspaces", Box::new(workspaces_menu));
        registry
    }

    pub fn register(&mut self, name: &str, generator: GeneratorFn) {
        self.generators.insert(name.to_string(), generator);
    }

    /// Run the named generator; `None` when no such generator exists (the
    /// loader drops the entry).
    pub fn generate(
        &self,
        name: &str,
        executor: &dyn ProcessExecutor,
        config: &Config,
    ) -> Option<CommandEntry> {
        match self.generators.get(name) {
            Some(generator) => Some(generator(executor, config)),
            None => {
                warn!(generator = name, "Unknown generator, dropping entry");
                None
            }
        }
    }
}

// ============================================================================
// Services
// ============================================================================

/// Build the services submenu from the supervisor's list output.
///
/// Lines containing the ownership marker are ours; the display name is the
/// suffix after the marker and the first tab-separated field says whether
/// the service is running ("-" means stopped). Each service gets a fixed
/// start/stop/restart/log/edit submenu; 'n' is reserved for "New Service".
pub fn services_menu(executor: &dyn ProcessExecutor, config: &Config) -> CommandEntry {
    let output = executor.run_sync(&config.service_tool, &["list"]);

    let mut services: Vec<(String, bool)> = Vec::new();
    for line in output.lines().filter(|l| l.contains(&config.service_marker)) {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 3 {
            continue;
        }
        let Some(name) = parts[2].split(&config.service_marker).last() else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let running = parts[0] != "-";
        services.push((name.to_string(), running));
    }
    services.sort_by(|a, b| a.0.cmp(&b.0));

    let mut items = CommandMap::new();
    let mut used: HashSet<char> = HashSet::from(['n']);
    for (name, running) in services {
        let Some(key) = assign_key(&name, &mut used) else {
            warn!(service = %name, "No free key for service, omitting");
            continue;
        };
        let glyph = if running { RUNNING_GLYPH } else { STOPPED_GLYPH };
        let mut actions = CommandMap::new();
        actions.insert(
            "s".to_string(),
            CommandEntry::action("Start", format!("service start {name}")),
        );
        actions.insert(
            "t".to_string(),
            CommandEntry::action("Stop", format!("service stop {name}")),
        );
        actions.insert(
            "r".to_string(),
            CommandEntry::action("Restart", format!("service restart {name}")),
        );
        actions.insert(
            "l".to_string(),
            CommandEntry::action("Log", format!("service log {name}")),
        );
        actions.insert(
            "e".to_string(),
            CommandEntry::action("Edit", format!("service edit {name}")),
        );
        items.insert(
            key.to_string(),
            CommandEntry::submenu(format!("{name} {glyph}"), actions),
        );
    }

    items.insert(
        "n".to_string(),
        CommandEntry::action("New Service", "service create"),
    );
    CommandEntry::submenu("Services", items)
}

// ============================================================================
// Snippets
// ============================================================================

struct Snippet {
    title: String,
    content: String,
    trigger: Option<String>,
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^:]+):(.*)$").expect("valid snippet header regex"))
}

fn trigger_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\s*$").expect("valid trigger regex"))
}

/// Parse the flat snippets file: each record starts with a `title:content`
/// header (title may carry an optional `[trigger]` suffix); non-empty lines
/// without a header continue the current record's content.
fn parse_snippets(contents: &str) -> Vec<Snippet> {
    let mut snippets = Vec::new();
    let mut current: Option<Snippet> = None;

    for line in contents.lines() {
        if let Some(caps) = header_regex().captures(line) {
            if let Some(snippet) = current.take() {
                snippets.push(snippet);
            }
            let raw_title = caps.get(1).map_or("", |m| m.as_str());
            let content = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();

            let (title, trigger) = match trigger_regex().captures(raw_title) {
                Some(tcaps) => {
                    let trigger = tcaps.get(1).map(|m| m.as_str().trim().to_string());
                    let title = raw_title[..tcaps.get(0).unwrap().start()].trim().to_string();
                    (title, trigger)
                }
                None => (raw_title.trim().to_string(), None),
            };
            current = Some(Snippet {
                title,
                content,
                trigger,
            });
        } else if !line.is_empty() {
            if let Some(snippet) = current.as_mut() {
                snippet.content.push('\n');
                snippet.content.push_str(line);
            }
        }
    }
    if let Some(snippet) = current.take() {
        snippets.push(snippet);
    }

    for snippet in &mut snippets {
        snippet.content = snippet.content.trim().to_string();
    }
    snippets
}

/// Escape content for embedding inside single quotes in a shell command.
fn shell_escape_single_quoted(content: &str) -> String {
    content.replace('\'', "'\\''")
}

/// Build the snippets submenu: one copy-to-clipboard action per record,
/// plus a fixed 'e' edit action. A missing file degrades to the edit
/// action alone.
pub fn snippets_menu(_executor: &dyn ProcessExecutor, config: &Config) -> CommandEntry {
    let snippets_file = config.snippets_file();
    let mut items = CommandMap::new();
    items.insert(
        "e".to_string(),
        CommandEntry::action(
            "Edit Snippets",
            format!("{} '{}'", config.editor, snippets_file.display()),
        ),
    );

    let Ok(contents) = std::fs::read_to_string(&snippets_file) else {
        debug!(path = %snippets_file.display(), "Snippets file unreadable, edit action only");
        return CommandEntry::submenu("Snippets", items);
    };

    let mut used: HashSet<char> = HashSet::from(['e']);
    for snippet in parse_snippets(&contents) {
        let Some(key) = assign_key(&snippet.title, &mut used) else {
            warn!(snippet = %snippet.title, "No free key for snippet, omitting");
            continue;
        };
        let display = match &snippet.trigger {
            Some(trigger) => format!("{} [{}]", snippet.title, trigger),
            None => snippet.title.clone(),
        };
        let escaped = shell_escape_single_quoted(&snippet.content);
        items.insert(
            key.to_string(),
            CommandEntry::action(
                display,
                format!(
                    "echo '{escaped}' | {} && echo 'Copied: {}'",
                    config.clipboard_tool, snippet.title
                ),
            ),
        );
    }

    CommandEntry::submenu("Snippets", items)
}

// ============================================================================
// Workspaces
// ============================================================================

/// Build the workspaces submenu: one action per definition file in the
/// workspace directory, invoking the runner with the file path. A missing
/// directory degrades to a single placeholder action.
pub fn workspaces_menu(_executor: &dyn ProcessExecutor, config: &Config) -> CommandEntry {
    let dir = config.workspace_dir();
    let runner = config.workspace_runner();

    let Ok(entries) = std::fs::read_dir(&dir) else {
        debug!(path = %dir.display(), "Workspace dir unreadable, placeholder only");
        let mut items = CommandMap::new();
        items.insert(
            "x".to_string(),
            CommandEntry::action("No workspace files found", "echo 'No workspace files'"),
        );
        return CommandEntry::submenu("Workspaces", items);
    };

    let suffix = format!(".{}", config.workspace_ext);
    let mut files: Vec<(String, std::path::PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let path = e.path();
            let file_name = path.file_name()?.to_str()?.to_string();
            let name = file_name.strip_suffix(&suffix)?.to_string();
            Some((name, path))
        })
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut items = CommandMap::new();
    let mut used: HashSet<char> = HashSet::new();
    for (name, path) in files {
        let Some(key) = assign_key(&name, &mut used) else {
            warn!(workspace = %name, "No free key for workspace, omitting");
            continue;
        };
        items.insert(
            key.to_string(),
            CommandEntry::action(
                name,
                format!("{} '{}'", runner.display(), path.display()),
            ),
        );
    }

    CommandEntry::submenu("Workspaces", items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::ScriptedExecutor;
    use std::io::Write;

    fn expect_children(entry: &CommandEntry) -> &CommandMap {
        match entry {
            CommandEntry::Submenu { children, .. } => children,
            CommandEntry::Action { .. } => panic!("expected submenu"),
        }
    }

    // ========================================
    // Services
    // ========================================

    #[test]
    fn services_parses_list_output_and_marks_state() {
        let output = "412\t0\tlocal.backup\n-\t0\tlocal.sync\n99\t0\tcom.apple.Finder\n";
        let executor = ScriptedExecutor::new().with_output("launchctl", output);
        let config = Config::default();

        let menu = services_menu(&executor, &config);
        let items = expect_children(&menu);

        let backup = items.get("b").expect("backup service");
        assert_eq!(backup.title(), "backup \u{25CF}");
        let sync = items.get("s").expect("sync service");
        assert_eq!(sync.title(), "sync \u{25CB}");

        // Foreign services filtered out by the ownership marker
        assert_eq!(items.len(), 3); // backup, sync, new-service
    }

    #[test]
    fn service_submenu_has_five_fixed_actions() {
        let output = "1\t0\tlocal.backup\n";
        let executor = ScriptedExecutor::new().with_output("launchctl", output);
        let menu = services_menu(&executor, &Config::default());
        let items = expect_children(&menu);

        let actions = expect_children(items.get("b").unwrap());
        assert_eq!(actions.len(), 5);
        for key in ["s", "t", "r", "l", "e"] {
            assert!(actions.contains_key(key), "missing action key {key}");
        }
        match actions.get("s").unwrap() {
            CommandEntry::Action { command, .. } => assert_eq!(command, "service start backup"),
            _ => panic!("expected action"),
        }
    }

    #[test]
    fn services_always_reserves_n_for_new_service() {
        // A service whose every candidate key is taken by 'n' up front
        let output = "1\t0\tlocal.n\n";
        let executor = ScriptedExecutor::new().with_output("launchctl", output);
        let menu = services_menu(&executor, &Config::default());
        let items = expect_children(&menu);

        assert_eq!(items.get("n").unwrap().title(), "New Service");
        // "n" service fell back to a digit key rather than stealing 'n'
        assert!(items.contains_key("0"));
    }

    #[test]
    fn services_total_failure_degrades_to_new_service_only() {
        let executor = ScriptedExecutor::new(); // launchctl yields ""
        let menu = services_menu(&executor, &Config::default());
        let items = expect_children(&menu);
        assert_eq!(items.len(), 1);
        assert_eq!(items.get("n").unwrap().title(), "New Service");
    }

    // ========================================
    // Snippets
    // ========================================

    #[test]
    fn parse_snippets_handles_headers_and_continuations() {
        let text = "Greeting:hello there\nSig [;sig]:Best,\nZed\n\nAddress:12 Main St\n";
        let snippets = parse_snippets(text);
        assert_eq!(snippets.len(), 3);

        assert_eq!(snippets[0].title, "Greeting");
        assert_eq!(snippets[0].content, "hello there");
        assert!(snippets[0].trigger.is_none());

        assert_eq!(snippets[1].title, "Sig");
        assert_eq!(snippets[1].trigger.as_deref(), Some(";sig"));
        assert_eq!(snippets[1].content, "Best,\nZed");

        assert_eq!(snippets[2].title, "Address");
        assert_eq!(snippets[2].content, "12 Main St");
    }

    #[test]
    fn parse_snippets_ignores_leading_continuations() {
        let snippets = parse_snippets("orphan line without header\n");
        assert!(snippets.is_empty());
    }

    #[test]
    fn shell_escape_handles_single_quotes() {
        assert_eq!(shell_escape_single_quoted("it's"), "it'\\''s");
        assert_eq!(shell_escape_single_quoted("plain"), "plain");
    }

    #[test]
    fn snippets_menu_builds_copy_actions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Greeting:hello").unwrap();
        let mut config = Config::default();
        config.snippets_file = file.path().to_string_lossy().into_owned();

        let executor = ScriptedExecutor::new();
        let menu = snippets_menu(&executor, &config);
        let items = expect_children(&menu);

        assert_eq!(items.get("e").unwrap().title(), "Edit Snippets");
        match items.get("g").unwrap() {
            CommandEntry::Action { title, command } => {
                assert_eq!(title, "Greeting");
                assert_eq!(command, "echo 'hello' | pbcopy && echo 'Copied: Greeting'");
            }
            _ => panic!("expected action"),
        }
    }

    #[test]
    fn snippets_menu_missing_file_keeps_edit_action() {
        let mut config = Config::default();
        config.snippets_file = "/nonexistent/snips.txt".to_string();
        let executor = ScriptedExecutor::new();

        let menu = snippets_menu(&executor, &config);
        let items = expect_children(&menu);
        assert_eq!(items.len(), 1);
        assert!(items.contains_key("e"));
    }

    #[test]
    fn snippet_display_title_reattaches_trigger() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Sig [;s]:Best").unwrap();
        let mut config = Config::default();
        config.snippets_file = file.path().to_string_lossy().into_owned();

        let menu = snippets_menu(&ScriptedExecutor::new(), &config);
        let items = expect_children(&menu);
        // 'e' taken by edit; 's' free since trigger is not part of key assignment
        assert_eq!(items.get("s").unwrap().title(), "Sig [;s]");
    }

    // ========================================
    // Workspaces
    // ========================================

    #[test]
    fn workspaces_menu_lists_files_sorted_with_runner_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("beta.ws"), "").unwrap();
        std::fs::write(dir.path().join("alpha.ws"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let mut config = Config::default();
        config.workspace_dir = dir.path().to_string_lossy().into_owned();
        config.workspace_runner = "/usr/local/bin/ws-open".to_string();

        let menu = workspaces_menu(&ScriptedExecutor::new(), &config);
        let items = expect_children(&menu);
        assert_eq!(items.len(), 2);

        match items.get("a").unwrap() {
            CommandEntry::Action { title, command } => {
                assert_eq!(title, "alpha");
                assert_eq!(
                    command,
                    &format!(
                        "/usr/local/bin/ws-open '{}'",
                        dir.path().join("alpha.ws").display()
                    )
                );
            }
            _ => panic!("expected action"),
        }
        assert_eq!(items.get("b").unwrap().title(), "beta");
    }

    #[test]
    fn workspaces_menu_missing_dir_yields_placeholder() {
        let mut config = Config::default();
        config.workspace_dir = "/nonexistent/workspaces".to_string();

        let menu = workspaces_menu(&ScriptedExecutor::new(), &config);
        let items = expect_children(&menu);
        assert_eq!(items.len(), 1);
        assert_eq!(items.get("x").unwrap().title(), "No workspace files found");
    }

    // ========================================
    // Registry
    // ========================================

    #[test]
    fn registry_dispatches_by_name() {
        let registry = GeneratorRegistry::builtin();
        let executor = ScriptedExecutor::new();
        let config = Config::default();

        assert!(registry.generate("services", &executor, &config).is_some());
        assert!(registry.generate("nope", &executor, &config).is_none());
    }

    #[test]
    fn registry_accepts_custom_generators() {
        let mut registry = GeneratorRegistry::empty();
        registry.register(
            "fixed",
            Box::new(|_, _| CommandEntry::submenu("Fixed", CommandMap::new())),
        );
        let entry = registry
            .generate("fixed", &ScriptedExecutor::new(), &Config::default())
            .unwrap();
        assert_eq!(entry.title(), "Fixed");
    }
}
