//! Command tree data model.
//!
//! `CommandEntry` is the recursive tagged node behind every menu: a leaf
//! `Action` (title + executable command string) or a `Submenu` owning a
//! keyed map of children. The tree is acyclic by construction and built
//! once at load time; generators run during loading, never lazily.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// One level of the menu: single-character key -> entry.
///
/// `BTreeMap` keeps traversal deterministic. Keys are stored lowercase, so
/// uniqueness within a map is case-insensitive by construction.
pub type CommandMap = BTreeMap<String, CommandEntry>;

#[derive(Debug, Clone, PartialEq)]
pub enum CommandEntry {
    Action { title: String, command: String },
    Submenu { title: String, children: CommandMap },
}

impl CommandEntry {
    pub fn action(title: impl Into<String>, command: impl Into<String>) -> Self {
        CommandEntry::Action {
            title: title.into(),
            command: command.into(),
        }
    }

    pub fn submenu(title: impl Into<String>, children: CommandMap) -> Self {
        CommandEntry::Submenu {
            title: title.into(),
            children,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            CommandEntry::Action { title, .. } => title,
            CommandEntry::Submenu { title, .. } => title,
        }
    }

    pub fn is_submenu(&self) -> bool {
        matches!(self, CommandEntry::Submenu { .. })
    }
}

/// Denormalized projection of one leaf `Action` for search: the key it is
/// bound to, its label, its command, and the breadcrumb of ancestor submenu
/// titles from the root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatCommand {
    pub key: String,
    pub label: String,
    pub command: String,
    pub path: Vec<String>,
}

/// Derive a unique single-character key for `name`.
///
/// Scans the lowercased name left-to-right for the first alphanumeric char
/// not already in `used`, then falls back to digits '0'..'9'. Inserts the
/// chosen key into `used`. Returns `None` when both passes are exhausted;
/// the caller omits the entry from its parent menu.
pub fn assign_key(name: &str, used: &mut HashSet<char>) -> Option<char> {
    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() && !used.contains(&c) {
            used.insert(c);
            return Some(c);
        }
    }
    for c in '0'..='9' {
        if !used.contains(&c) {
            used.insert(c);
            return Some(c);
        }
    }
    None
}

/// Flatten a command tree depth-first into one `FlatCommand` per leaf
/// Action, each carrying the ordered list of ancestor submenu titles.
pub fn flatten(menu: &CommandMap) -> Vec<FlatCommand> {
    let mut results = Vec::new();
    flatten_into(menu, &[], &mut results);
    results
}

fn flatten_into(menu: &CommandMap, path: &[String], results: &mut Vec<FlatCommand>) {
    for (key, entry) in menu {
        match entry {
            CommandEntry::Action { title, command } => {
                results.push(FlatCommand {
                    key: key.clone(),
                    label: title.clone(),
                    command: command.clone(),
                    path: path.to_vec(),
                });
            }
            CommandEntry::Submenu { title, children } => {
                let mut child_path = path.to_vec();
                child_path.push(title.clone());
                flatten_into(children, &child_path, results);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> CommandMap {
        let mut dev = CommandMap::new();
        dev.insert("c".to_string(), CommandEntry::action("Build", "make"));
        let mut root = CommandMap::new();
        root.insert("a".to_string(), CommandEntry::action("Open Editor", "nvim"));
        root.insert("b".to_string(), CommandEntry::submenu("Dev", dev));
        root
    }

    #[test]
    fn assign_key_picks_first_free_alphanumeric() {
        let mut used = HashSet::new();
        assert_eq!(assign_key("backup", &mut used), Some('b'));
        assert_eq!(assign_key("browse", &mut used), Some('r'));
        assert!(used.contains(&'b') && used.contains(&'r'));
    }

    #[test]
    fn assign_key_is_case_insensitive() {
        let mut used = HashSet::new();
        assert_eq!(assign_key("Notes", &mut used), Some('n'));
    }

    #[test]
    fn assign_key_skips_non_alphanumeric() {
        let mut used = HashSet::new();
        assert_eq!(assign_key("--dry run", &mut used), Some('d'));
    }

    #[test]
    fn assign_key_falls_back_to_digits() {
        let mut used: HashSet<char> = "abc".chars().collect();
        assert_eq!(assign_key("abc", &mut used), Some('0'));
        assert_eq!(assign_key("cab", &mut used), Some('1'));
    }

    #[test]
    fn assign_key_exhausted_returns_none() {
        let mut used: HashSet<char> = "ab".chars().chain('0'..='9').collect();
        assert_eq!(assign_key("ab", &mut used), None);
    }

    #[test]
    fn assign_key_is_deterministic() {
        let run = || {
            let mut used: HashSet<char> = "st".chars().collect();
            assign_key("status", &mut used)
        };
        assert_eq!(run(), run());
        assert_eq!(run(), Some('a'));
    }

    #[test]
    fn flatten_yields_one_entry_per_leaf() {
        let flat = flatten(&sample_tree());
        assert_eq!(flat.len(), 2);

        let editor = flat.iter().find(|c| c.key == "a").unwrap();
        assert_eq!(editor.label, "Open Editor");
        assert_eq!(editor.command, "nvim");
        assert!(editor.path.is_empty());

        let build = flat.iter().find(|c| c.key == "c").unwrap();
        assert_eq!(build.label, "Build");
        assert_eq!(build.command, "make");
        assert_eq!(build.path, vec!["Dev".to_string()]);
    }

    #[test]
    fn flatten_nested_path_lists_all_ancestors() {
        let mut inner = CommandMap::new();
        inner.insert("x".to_string(), CommandEntry::action("Deep", "true"));
        let mut mid = CommandMap::new();
        mid.insert("m".to_string(), CommandEntry::submenu("Inner", inner));
        let mut root = CommandMap::new();
        root.insert("o".to_string(), CommandEntry::submenu("Outer", mid));

        let flat = flatten(&root);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].path, vec!["Outer".to_string(), "Inner".to_string()]);
    }

    #[test]
    fn flatten_empty_tree_is_empty() {
        assert!(flatten(&CommandMap::new()).is_empty());
    }

    #[test]
    fn flat_commands_serialize_with_breadcrumb_path() {
        let flat = flatten(&sample_tree());
        let json = serde_json::to_string(&flat).unwrap();
        assert!(json.contains(r#""key":"c""#));
        assert!(json.contains(r#""label":"Build""#));
        assert!(json.contains(r#""path":["Dev"]"#));
    }
}
