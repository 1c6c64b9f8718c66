//! App Catalog - cache-first, asynchronously refreshed list of installed
//! applications.
//!
//! Load order:
//! 1. On-disk JSON cache (skipped when a rescan is forced), delivered
//!    immediately as a non-final result
//! 2. Full directory scan (only when no cache existed), delivered non-final
//! 3. Background recency refresh: per-app last-used timestamps from the
//!    metadata tool, re-sorted (recent first, unknown last alphabetical),
//!    persisted as the new cache, delivered final
//!
//! Icon resolution is separate and on-demand: a cached PNG keyed by
//! sanitized app name is used when present; otherwise callers fall back to
//! a generic icon while extraction (locate an .icns in the bundle, convert
//! with the configured tool) runs in the background. Extraction is
//! idempotent - it skips when the target exists and an in-flight set
//! prevents duplicate work per app.
//!
//! Consumers must tolerate receiving the same logical list twice and must
//! discard updates whose requesting mode is no longer active.

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{LogResultExt, OverlookError, Result};
use crate::executor::ProcessExecutor;

/// App bundle directory suffix.
const APP_SUFFIX: &str = ".app";
/// Extracted icon edge length in pixels.
const ICON_SIZE: &str = "96";

/// Information about one installed application. Identity is `name`; the
/// first directory in priority order wins on duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<f64>,
}

/// One delivery from `load_apps`. The final update carries the
/// recency-sorted, freshly persisted list.
#[derive(Debug, Clone)]
pub struct AppCatalogUpdate {
    pub apps: Vec<AppInfo>,
    pub is_final: bool,
}

/// Load applications, delivering updates on `tx`.
///
/// Returns immediately; all slow work happens on background threads. Send
/// failures are ignored - a dropped receiver just means the panel closed.
/// `force_scan` skips the cache read; the rescanned list still gets
/// persisted as the new cache by the recency refresh.
pub fn load_apps(
    config: Config,
    executor: Arc<dyn ProcessExecutor>,
    tx: Sender<AppCatalogUpdate>,
    force_scan: bool,
) {
    if let Some(cached) = (!force_scan).then(|| load_cache(&config)).flatten() {
        debug!(count = cached.len(), "Delivering cached app list");
        let _ = tx.send(AppCatalogUpdate {
            apps: cached.clone(),
            is_final: false,
        });
        std::thread::spawn(move || {
            refresh_recency(&config, executor.as_ref(), cached, &tx);
        });
        return;
    }

    std::thread::spawn(move || {
        let apps = scan_apps(&config);
        info!(count = apps.len(), "Scanned application directories");
        let _ = tx.send(AppCatalogUpdate {
            apps: apps.clone(),
            is_final: false,
        });
        refresh_recency(&config, executor.as_ref(), apps, &tx);
    });
}

/// Scan the configured application directories, deduplicating by name
/// (first directory in priority order wins), sorted alphabetically.
pub fn scan_apps(config: &Config) -> Vec<AppInfo> {
    let mut apps = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for dir in config.app_dirs() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(name) = file_name.strip_suffix(APP_SUFFIX) else {
                continue;
            };
            if !seen.insert(name.to_string()) {
                continue;
            }
            apps.push(AppInfo {
                name: name.to_string(),
                path: dir.join(file_name).to_string_lossy().into_owned(),
                icon: Some(icon_path(config, name).to_string_lossy().into_owned()),
                last_used: None,
            });
        }
    }

    apps.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    apps
}

/// Query last-used timestamps for every app, re-sort by recency, persist
/// the result as the new cache, and deliver it as the final update.
fn refresh_recency(
    config: &Config,
    executor: &dyn ProcessExecutor,
    mut apps: Vec<AppInfo>,
    tx: &Sender<AppCatalogUpdate>,
) {
    for app in &mut apps {
        app.last_used = query_last_used(config, executor, &app.path);
    }
    sort_by_recency(&mut apps);
    save_cache(config, &apps).log_err();
    let _ = tx.send(AppCatalogUpdate {
        apps,
        is_final: true,
    });
}

/// Entries with a timestamp first (most recent first), entries without
/// last, alphabetically.
pub fn sort_by_recency(apps: &mut [AppInfo]) {
    apps.sort_by(|a, b| match (a.last_used, b.last_used) {
        (Some(la), Some(lb)) => lb.partial_cmp(&la).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });
}

fn query_last_used(config: &Config, executor: &dyn ProcessExecutor, path: &str) -> Option<f64> {
    let output = executor.run_sync(
        &config.metadata_tool,
        &["-name", "kMDItemLastUsedDate", path],
    );
    parse_last_used(&output)
}

fn last_used_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}").expect("valid timestamp regex")
    })
}

/// Parse metadata tool output like
/// `kMDItemLastUsedDate = 2024-01-15 10:30:00 +0000` into a UTC epoch.
fn parse_last_used(output: &str) -> Option<f64> {
    if output.contains("(null)") {
        return None;
    }
    let matched = last_used_regex().find(output)?;
    let parsed = NaiveDateTime::parse_from_str(matched.as_str(), "%Y-%m-%d %H:%M:%S").ok()?;
    Some(parsed.and_utc().timestamp() as f64)
}

// ============================================================================
// On-disk cache
// ============================================================================

pub fn load_cache(config: &Config) -> Option<Vec<AppInfo>> {
    let path = config.app_cache_path();
    let contents = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(apps) => Some(apps),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "App cache unreadable, ignoring");
            None
        }
    }
}

pub fn save_cache(config: &Config, apps: &[AppInfo]) -> Result<()> {
    let path = config.app_cache_path();
    let cache_io = |source| OverlookError::CacheIo {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(cache_io)?;
    }
    let contents = serde_json::to_string(apps)?;
    std::fs::write(&path, contents).map_err(cache_io)?;
    debug!(path = %path.display(), count = apps.len(), "Persisted app cache");
    Ok(())
}

// ============================================================================
// Icons
// ============================================================================

/// Apps whose icon extraction is currently running, keyed by sanitized name.
fn in_flight() -> &'static Mutex<HashSet<String>> {
    static IN_FLIGHT: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    IN_FLIGHT.get_or_init(|| Mutex::new(HashSet::new()))
}

/// File-system-safe app name for the icon cache.
pub fn sanitize_name(name: &str) -> String {
    name.replace(['/', ' '], "_")
}

/// Cache location for an app's icon, whether or not it exists yet.
pub fn icon_path(config: &Config, app_name: &str) -> PathBuf {
    config
        .icon_cache_dir()
        .join(format!("{}.png", sanitize_name(app_name)))
}

/// Cached icon for `app` if the file exists; `None` means the caller
/// should show a generic icon (and may kick off `extract_icon`).
pub fn resolve_icon(config: &Config, app: &AppInfo) -> Option<PathBuf> {
    let path = match app.icon.as_ref() {
        Some(icon) => PathBuf::from(icon),
        None => icon_path(config, &app.name),
    };
    path.exists().then_some(path)
}

/// Extract an app's icon into the cache in the background.
///
/// Locates the first `.icns` under `<bundle>/Contents/Resources` and
/// converts it to a fixed-size PNG. `on_done` receives the icon path on
/// success, `None` otherwise (including when extraction was already
/// running for this app).
pub fn extract_icon(
    config: Config,
    executor: Arc<dyn ProcessExecutor>,
    app_path: String,
    app_name: String,
    on_done: impl FnOnce(Option<PathBuf>) + Send + 'static,
) {
    let target = icon_path(&config, &app_name);
    if target.exists() {
        on_done(Some(target));
        return;
    }

    let key = sanitize_name(&app_name);
    if !in_flight().lock().insert(key.clone()) {
        debug!(app = %app_name, "Icon extraction already in flight");
        on_done(None);
        return;
    }

    std::thread::spawn(move || {
        let result = run_extraction(&config, executor.as_ref(), &app_path, &target);
        in_flight().lock().remove(&key);
        on_done(result);
    });
}

fn run_extraction(
    config: &Config,
    executor: &dyn ProcessExecutor,
    app_path: &str,
    target: &std::path::Path,
) -> Option<PathBuf> {
    let resources = PathBuf::from(app_path).join("Contents").join("Resources");
    let entries = std::fs::read_dir(&resources).ok()?;
    let icns = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.extension().is_some_and(|ext| ext == "icns"))?;

    std::fs::create_dir_all(config.icon_cache_dir()).warn_on_err();
    executor.run_sync(
        &config.icon_tool,
        &[
            "-s",
            "format",
            "png",
            "-z",
            ICON_SIZE,
            ICON_SIZE,
            &icns.to_string_lossy(),
            "--out",
            &target.to_string_lossy(),
        ],
    );
    target.exists().then(|| target.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::ScriptedExecutor;
    use std::sync::mpsc;
    use std::time::Duration;

    fn app(name: &str, last_used: Option<f64>) -> AppInfo {
        AppInfo {
            name: name.to_string(),
            path: format!("/Applications/{name}.app"),
            icon: None,
            last_used,
        }
    }

    fn config_with_dirs(dirs: &[&std::path::Path]) -> Config {
        let mut config = Config::default();
        config.app_dirs = dirs
            .iter()
            .map(|d| d.to_string_lossy().into_owned())
            .collect();
        config
    }

    #[test]
    fn scan_dedups_by_name_first_dir_wins() {
        let primary = tempfile::tempdir().unwrap();
        let secondary = tempfile::tempdir().unwrap();
        std::fs::create_dir(primary.path().join("Safari.app")).unwrap();
        std::fs::create_dir(secondary.path().join("Safari.app")).unwrap();
        std::fs::create_dir(secondary.path().join("Mail.app")).unwrap();
        std::fs::write(secondary.path().join("README.txt"), "").unwrap();

        let config = config_with_dirs(&[primary.path(), secondary.path()]);
        let apps = scan_apps(&config);

        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].name, "Mail");
        assert_eq!(apps[1].name, "Safari");
        let safari = apps.iter().find(|a| a.name == "Safari").unwrap();
        assert!(safari.path.starts_with(&primary.path().to_string_lossy().into_owned()));
    }

    #[test]
    fn scan_sorts_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("iTerm.app")).unwrap();
        std::fs::create_dir(dir.path().join("Brave.app")).unwrap();
        let apps = scan_apps(&config_with_dirs(&[dir.path()]));
        assert_eq!(apps[0].name, "Brave");
        assert_eq!(apps[1].name, "iTerm");
    }

    #[test]
    fn recency_sort_puts_timestamped_first_descending() {
        let mut apps = vec![
            app("Zeta", None),
            app("Mail", Some(100.0)),
            app("Alpha", None),
            app("Safari", Some(900.0)),
        ];
        sort_by_recency(&mut apps);
        let names: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Safari", "Mail", "Alpha", "Zeta"]);
    }

    #[test]
    fn parse_last_used_handles_null_and_dates() {
        assert_eq!(parse_last_used("kMDItemLastUsedDate = (null)"), None);
        assert_eq!(parse_last_used(""), None);
        assert_eq!(
            parse_last_used("kMDItemLastUsedDate = 2024-01-15 10:30:00 +0000"),
            Some(1_705_314_600.0)
        );
    }

    #[test]
    fn cache_round_trips_with_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.app_cache_path = dir
            .path()
            .join("apps.json")
            .to_string_lossy()
            .into_owned();

        let apps = vec![app("Safari", Some(42.0))];
        save_cache(&config, &apps).unwrap();

        let raw = std::fs::read_to_string(config.app_cache_path()).unwrap();
        assert!(raw.contains("\"lastUsed\":42.0"));
        assert_eq!(load_cache(&config), Some(apps));
    }

    #[test]
    fn corrupt_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("apps.json");
        std::fs::write(&cache, "[{broken").unwrap();
        let mut config = Config::default();
        config.app_cache_path = cache.to_string_lossy().into_owned();
        assert_eq!(load_cache(&config), None);
    }

    #[test]
    fn load_apps_delivers_cache_then_refreshed_final() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.app_cache_path = dir
            .path()
            .join("apps.json")
            .to_string_lossy()
            .into_owned();

        let cached = vec![app("Mail", None), app("Safari", None)];
        save_cache(&config, &cached).unwrap();

        let executor = Arc::new(
            ScriptedExecutor::new().with_output("mdls", "kMDItemLastUsedDate = (null)"),
        );
        let (tx, rx) = mpsc::channel();
        load_apps(config, executor, tx, false);

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(!first.is_final);
        assert_eq!(first.apps, cached);

        let last = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(last.is_final);
        // No timestamps anywhere, so the refreshed list stays alphabetical
        assert_eq!(last.apps.len(), 2);
        assert_eq!(last.apps[0].name, "Mail");
    }

    #[test]
    fn load_apps_forced_scan_skips_cache_and_persists_fresh_list() {
        let cache_dir = tempfile::tempdir().unwrap();
        let app_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(app_dir.path().join("Safari.app")).unwrap();

        let mut config = config_with_dirs(&[app_dir.path()]);
        config.app_cache_path = cache_dir
            .path()
            .join("apps.json")
            .to_string_lossy()
            .into_owned();

        // Stale cache that a forced rescan must not deliver
        save_cache(&config, &[app("Obsolete", None)]).unwrap();

        let executor = Arc::new(
            ScriptedExecutor::new().with_output("mdls", "kMDItemLastUsedDate = (null)"),
        );
        let (tx, rx) = mpsc::channel();
        load_apps(config.clone(), executor, tx, true);

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(!first.is_final);
        assert_eq!(first.apps.len(), 1);
        assert_eq!(first.apps[0].name, "Safari");

        let last = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(last.is_final);
        // The rescan replaced the old cache on disk
        let persisted = load_cache(&config).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].name, "Safari");
    }

    #[test]
    fn save_cache_unwritable_path_reports_cache_io() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let mut config = Config::default();
        // Parent of the cache path is a plain file, so the dir cannot be made
        config.app_cache_path = blocker
            .path()
            .join("apps.json")
            .to_string_lossy()
            .into_owned();

        let err = save_cache(&config, &[]).unwrap_err();
        assert!(matches!(err, OverlookError::CacheIo { .. }));
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_name("Visual Studio Code"), "Visual_Studio_Code");
        assert_eq!(sanitize_name("a/b"), "a_b");
    }

    #[test]
    fn resolve_icon_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let icon = dir.path().join("Safari.png");

        let mut info = app("Safari", None);
        info.icon = Some(icon.to_string_lossy().into_owned());
        assert_eq!(resolve_icon(&Config::default(), &info), None);

        std::fs::write(&icon, "png").unwrap();
        assert_eq!(resolve_icon(&Config::default(), &info), Some(icon));
    }

    #[test]
    fn extract_icon_skips_when_target_exists() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.icon_cache_dir = dir.path().to_string_lossy().into_owned();
        std::fs::write(dir.path().join("Safari.png"), "png").unwrap();

        let executor = Arc::new(ScriptedExecutor::new());
        let (tx, rx) = mpsc::channel();
        extract_icon(
            config,
            executor.clone(),
            "/Applications/Safari.app".to_string(),
            "Safari".to_string(),
            move |result| {
                let _ = tx.send(result);
            },
        );
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(result.is_some());
        assert!(executor.recorded_calls().is_empty());
    }

    #[test]
    fn extract_icon_missing_bundle_reports_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.icon_cache_dir = dir.path().to_string_lossy().into_owned();

        let (tx, rx) = mpsc::channel();
        extract_icon(
            config,
            Arc::new(ScriptedExecutor::new()),
            "/nonexistent/Ghost.app".to_string(),
            "Ghost".to_string(),
            move |result| {
                let _ = tx.send(result);
            },
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), None);
    }
}
