//! File Enumerator (§4.1) — produces the candidate file list a query is
//! scored against. Tries VCS-tracked enumeration first, falls back to the
//! native `find` binary, then to a bounded `ignore`-crate walk. Never blocks
//! past the overall scan timeout; a timeout yields an empty result rather
//! than a partial one (§4.1 edge cases).
use crate::config::RuntimeConfig;
use crate::types::FileCandidate;
use dashmap::DashMap;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::process::Command;

const CURATED_IGNORE_PREFIXES: &[&str] = &[
    ".git/",
    "node_modules/",
    "target/",
    "dist/",
    "build/",
    ".next/",
    "out/",
    "coverage/",
    "vendor/",
    "__pycache__/",
    ".venv/",
    ".nuxt/",
];

const MAX_UNTRACKED_SCAN_WHEN_LARGE: usize = 50_000;

fn vcs_repo_cache() -> &'static DashMap<PathBuf, bool> {
    static CACHE: OnceLock<DashMap<PathBuf, bool>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Test-only reset of the per-process VCS repo-check memoization (§9).
#[cfg(any(test, feature = "test-support"))]
pub fn reset_vcs_cache() {
    vcs_repo_cache().clear();
}

fn is_git_repo(root: &Path) -> bool {
    if let Some(cached) = vcs_repo_cache().get(root) {
        return *cached;
    }
    let result = git2::Repository::discover(root).is_ok();
    vcs_repo_cache().insert(root.to_path_buf(), result);
    result
}

fn binary_probe_cache() -> &'static DashMap<String, bool> {
    static CACHE: OnceLock<DashMap<String, bool>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Whether `name` resolves on `PATH`, memoized for the process lifetime (§9).
pub fn is_binary_available(name: &str) -> bool {
    if let Some(cached) = binary_probe_cache().get(name) {
        return *cached;
    }
    let found = std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let candidate = dir.join(name);
                candidate.is_file()
            })
        })
        .unwrap_or(false);
    binary_probe_cache().insert(name.to_string(), found);
    found
}

fn to_relative(root: &Path, abs: &Path) -> Option<String> {
    abs.strip_prefix(root).ok().map(|p| p.to_string_lossy().replace('\\', "/"))
}

const MAX_WALK_DEPTH: usize = 10;

/// Build the ignore matcher shared by every enumeration strategy (§4.1): the
/// curated prefix set plus any `MANTIC_IGNORE_PATTERNS` glob additions,
/// compiled once so git/find/walk output is filtered the same way.
fn build_ignore_matcher(root: &Path, extra_patterns: &[String]) -> ignore::gitignore::Gitignore {
    let mut builder = ignore::gitignore::GitignoreBuilder::new(root);
    for prefix in CURATED_IGNORE_PREFIXES {
        let _ = builder.add_line(None, &format!("{prefix}**"));
    }
    for pattern in extra_patterns {
        let _ = builder.add_line(None, pattern);
    }
    builder.build().unwrap_or_else(|_| ignore::gitignore::Gitignore::empty())
}

fn apply_ignore_filter(paths: Vec<String>, matcher: &ignore::gitignore::Gitignore) -> Vec<String> {
    paths.into_iter().filter(|p| !matcher.matched(p, false).is_ignore()).collect()
}

/// Strategy 1: enumerate via libgit2 (tracked files, plus untracked-but-not-ignored
/// unless the tracked set is already very large).
fn enumerate_via_git(root: &Path) -> Option<Vec<String>> {
    if !is_git_repo(root) {
        return None;
    }
    let repo = git2::Repository::discover(root).ok()?;
    let index = repo.index().ok()?;

    let mut paths = Vec::new();
    for entry in index.iter() {
        if let Ok(p) = String::from_utf8(entry.path.clone()) {
            paths.push(p);
        }
    }

    if paths.len() > MAX_UNTRACKED_SCAN_WHEN_LARGE {
        return Some(paths);
    }

    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true).recurse_untracked_dirs(true).include_ignored(false);
    if let Ok(statuses) = repo.statuses(Some(&mut opts)) {
        for entry in statuses.iter() {
            if entry.status().contains(git2::Status::WT_NEW) {
                if let Some(p) = entry.path() {
                    paths.push(p.to_string());
                }
            }
        }
    }

    paths.sort();
    paths.dedup();
    Some(paths)
}

/// Strategy 2: shell out to the native `find` binary. Output is null-delimited
/// (`-print0`) so paths containing newlines or other unusual bytes survive
/// intact (§4.1).
async fn enumerate_via_find(root: &Path) -> Option<Vec<String>> {
    if !is_binary_available("find") {
        return None;
    }
    let mut prune_args = Vec::new();
    for prefix in CURATED_IGNORE_PREFIXES {
        let name = prefix.trim_end_matches('/');
        prune_args.push("-name".to_string());
        prune_args.push(name.to_string());
        prune_args.push("-o".to_string());
    }
    if !prune_args.is_empty() {
        prune_args.pop();
    }

    let output = Command::new("find")
        .arg(root)
        .arg("(")
        .args(&prune_args)
        .arg(")")
        .arg("-prune")
        .arg("-o")
        .arg("-type")
        .arg("f")
        .arg("-print0")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let paths = output
        .stdout
        .split(|&b| b == 0)
        .filter(|chunk| !chunk.is_empty())
        .filter_map(|chunk| to_relative(root, Path::new(String::from_utf8_lossy(chunk).trim())))
        .filter(|p| !p.is_empty())
        .collect();
    Some(paths)
}

/// Strategy 3: bounded walk using the `ignore` crate, honoring `.gitignore`
/// plus curated prefixes and the caller's extra patterns. Depth-bounded
/// (§4.1: "walk the directory to a bounded depth (default 10)") to protect
/// the scan timeout against pathologically deep trees.
fn enumerate_via_ignore_walk(root: &Path, extra_patterns: &[String]) -> Vec<String> {
    let mut builder = WalkBuilder::new(root);
    builder.hidden(false).git_ignore(true).git_exclude(true).parents(true).max_depth(Some(MAX_WALK_DEPTH));

    let mut overrides = ignore::overrides::OverrideBuilder::new(root);
    for prefix in CURATED_IGNORE_PREFIXES {
        let _ = overrides.add(&format!("!{prefix}**"));
    }
    for pattern in extra_patterns {
        let _ = overrides.add(&format!("!{pattern}"));
    }
    if let Ok(built) = overrides.build() {
        builder.overrides(built);
    }

    let mut paths = Vec::new();
    for entry in builder.build() {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_some_and(|ft| ft.is_file()) {
                    if let Some(rel) = to_relative(root, entry.path()) {
                        paths.push(rel);
                    }
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "ignore-walk entry skipped");
            }
        }
    }
    paths
}

fn to_candidates(root: &Path, paths: Vec<String>) -> Vec<FileCandidate> {
    paths
        .into_iter()
        .map(|path| {
            let abs = root.join(&path);
            let (size, mtime) = std::fs::metadata(&abs)
                .map(|m| (Some(m.len()), m.modified().ok().and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok()).map(|d| d.as_secs() as i64)))
                .unwrap_or((None, None));
            let tag = crate::classify::classify(&path);
            FileCandidate { path, tag, size, mtime }
        })
        .collect()
}

async fn enumerate_inner(root: &Path, config: &RuntimeConfig) -> Vec<FileCandidate> {
    let matcher = build_ignore_matcher(root, &config.extra_ignore_patterns);
    if let Some(paths) = enumerate_via_git(root) {
        return to_candidates(root, apply_ignore_filter(paths, &matcher));
    }
    if let Some(paths) = enumerate_via_find(root).await {
        return to_candidates(root, apply_ignore_filter(paths, &matcher));
    }
    let paths = enumerate_via_ignore_walk(root, &config.extra_ignore_patterns);
    to_candidates(root, apply_ignore_filter(paths, &matcher))
}

/// Enumerate candidate files under `root`, respecting the overall scan
/// timeout. On timeout returns an empty list rather than a partial one.
pub async fn enumerate(root: &Path, config: &RuntimeConfig) -> crate::error::Result<Vec<FileCandidate>> {
    if !root.is_dir() {
        return Err(crate::error::MantiError::InvalidRoot(root.to_path_buf()));
    }
    match tokio::time::timeout(config.timeout, enumerate_inner(root, config)).await {
        Ok(candidates) => Ok(candidates),
        Err(_) => {
            tracing::warn!(root = %root.display(), "scan timed out, returning empty result");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn binary_probe_finds_sh() {
        assert!(is_binary_available("sh"));
        assert!(!is_binary_available("definitely-not-a-real-binary-xyz"));
    }

    #[tokio::test]
    async fn ignore_walk_skips_curated_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(dir.path().join("src.rs"), "fn main() {}").unwrap();

        let paths = enumerate_via_ignore_walk(dir.path(), &[]);
        assert!(paths.iter().any(|p| p == "src.rs"));
        assert!(!paths.iter().any(|p| p.contains("node_modules")));
    }

    #[tokio::test]
    async fn enumerate_returns_empty_for_missing_root() {
        let config = RuntimeConfig::default();
        let result = enumerate(Path::new("/no/such/path/mantic-test"), &config).await;
        assert!(result.is_err());
    }
}
