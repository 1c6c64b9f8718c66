//! Search over the flattened command index.
//!
//! Case-insensitive substring match of the query against each command's
//! label or any of its breadcrumb path segments, capped at a fixed result
//! count. The index itself comes from `commands::flatten`.

use crate::commands::FlatCommand;

/// Result cap for a single query.
pub const MAX_SEARCH_RESULTS: usize = 30;

/// Filter `commands` by `query`. An empty query matches nothing.
pub fn search(commands: &[FlatCommand], query: &str) -> Vec<FlatCommand> {
    let query = query.to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    commands
        .iter()
        .filter(|cmd| {
            cmd.label.to_lowercase().contains(&query)
                || cmd.path.iter().any(|seg| seg.to_lowercase().contains(&query))
        })
        .take(MAX_SEARCH_RESULTS)
        .cloned()
        .collect()
}
