//! Semantic Index (§4.5) — a persisted, incrementally-refreshed best-effort
//! structural index (exports/imports/components/functions) used by the
//! [`crate::smart_filter`] and [`crate::graph`] stages. Regex-based, not a
//! real parser: good enough to narrow candidates, never authoritative.

use crate::config::now_secs;
use crate::types::{
    CacheIndex, ExportKind, ExportedSymbol, FileCandidate, FileEntry, FunctionRecord, ImportRecord,
    ProjectMetadata,
};
use lru::LruCache;
use regex::Regex;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

const INDEX_FILE: &str = "index.json";
const CACHE_CAPACITY: usize = 3;
const CACHE_FRESHNESS: Duration = Duration::from_secs(5 * 60);
const PARSE_CONCURRENCY: usize = 50;

const EXTRACTABLE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

fn index_dir(root: &Path) -> PathBuf {
    root.join(crate::config::TOOL_DIR)
}

fn index_path(root: &Path) -> PathBuf {
    index_dir(root).join(INDEX_FILE)
}

type CacheEntry = (Instant, CacheIndex);

fn process_cache() -> &'static Mutex<LruCache<String, CacheEntry>> {
    static CACHE: OnceLock<Mutex<LruCache<String, CacheEntry>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())))
}

/// Test-only reset of the in-process index cache (§9).
#[cfg(any(test, feature = "test-support"))]
pub fn reset_process_cache() {
    process_cache().lock().unwrap().clear();
}

fn root_key(root: &Path) -> String {
    root.to_string_lossy().to_string()
}

/// Load the persisted index from disk, verifying version and root (§4.5, §3 invariant ii).
fn load_from_disk(root: &Path) -> Option<CacheIndex> {
    let path = index_path(root);
    let bytes = std::fs::read(&path).ok()?;
    let index: CacheIndex = serde_json::from_slice(&bytes).ok()?;
    let key = root_key(root);
    if index.is_authoritative(&key, now_secs()) {
        Some(index)
    } else {
        None
    }
}

fn write_companion_gitignore(dir: &Path) {
    let gitignore = dir.join(".gitignore");
    if !gitignore.exists() {
        let _ = std::fs::write(&gitignore, "*\n!.gitignore\n");
    }
}

/// Persist the index atomically: write to a temp file, then rename over the
/// target so a crash mid-write never corrupts the on-disk copy.
pub fn save(root: &Path, index: &CacheIndex) -> crate::error::Result<()> {
    let dir = index_dir(root);
    std::fs::create_dir_all(&dir)?;
    write_companion_gitignore(&dir);

    let path = index_path(root);
    let tmp = dir.join(format!("{INDEX_FILE}.{}.tmp", std::process::id()));
    let bytes = serde_json::to_vec_pretty(index)?;
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Fetch the freshest available index for `root`: the in-process LRU cache
/// first (if within the freshness window), else the on-disk document.
pub fn get_or_load(root: &Path) -> CacheIndex {
    let key = root_key(root);
    {
        let mut cache = process_cache().lock().unwrap();
        if let Some((loaded_at, index)) = cache.get(&key) {
            if loaded_at.elapsed() < CACHE_FRESHNESS {
                return index.clone();
            }
        }
    }

    let index = load_from_disk(root).unwrap_or_else(|| CacheIndex::new(key.clone()));
    process_cache().lock().unwrap().put(key, (Instant::now(), index.clone()));
    index
}

fn update_cache(root: &Path, index: CacheIndex) {
    let key = root_key(root);
    process_cache().lock().unwrap().put(key, (Instant::now(), index));
}

struct Extractors {
    import_es: Regex,
    import_require: Regex,
    export_named: Regex,
    export_default: Regex,
    export_const: Regex,
    function_decl: Regex,
    arrow_const: Regex,
    class_decl: Regex,
    type_decl: Regex,
    component_decl: Regex,
}

fn extractors() -> &'static Extractors {
    static EXT: OnceLock<Extractors> = OnceLock::new();
    EXT.get_or_init(|| Extractors {
        import_es: Regex::new(r#"(?m)^\s*import\s+(?:type\s+)?(.+?)\s+from\s+['"]([^'"]+)['"]"#).unwrap(),
        import_require: Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
        export_named: Regex::new(r"(?m)^\s*export\s+(?:const|function|class|interface|type)\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
        export_default: Regex::new(r"(?m)^\s*export\s+default\s+(?:function\s+|class\s+)?([A-Za-z_$][A-Za-z0-9_$]*)?").unwrap(),
        export_const: Regex::new(r"(?m)^\s*export\s*\{\s*([^}]+)\s*\}").unwrap(),
        function_decl: Regex::new(r"(?m)^\s*(export\s+)?(async\s+)?function\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
        arrow_const: Regex::new(r"(?m)^\s*(export\s+)?const\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*(?::[^=]+)?=\s*(async\s*)?\(").unwrap(),
        class_decl: Regex::new(r"(?m)^\s*(export\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
        type_decl: Regex::new(r"(?m)^\s*(export\s+)?(?:type|interface)\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
        component_decl: Regex::new(r"^[A-Z][A-Za-z0-9_$]*$").unwrap(),
    })
}

fn extract_names(spec: &str) -> Vec<String> {
    spec.split(',')
        .map(|s| s.split(" as ").next().unwrap_or(s).trim().trim_start_matches('{').trim_end_matches('}').trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Detected language tag for a TS/JS-family path (§3, §4.5: `typescript`,
/// `javascript`, `tsx`, `jsx`).
fn language_for(path: &str) -> &'static str {
    match crate::util::extension(path) {
        "tsx" => "tsx",
        "jsx" => "jsx",
        "js" | "mjs" | "cjs" => "javascript",
        _ => "typescript",
    }
}

/// Best-effort structural extraction for a single TS/JS-family file (§4.5).
/// Never fails: a file this doesn't understand simply yields empty fields.
pub fn extract_file(path: &str, content: &str, mtime: i64, size: u64) -> FileEntry {
    let ex = extractors();
    let mut imports = Vec::new();
    let mut exports = Vec::new();
    let mut functions = Vec::new();
    let mut classes = Vec::new();
    let mut types = Vec::new();
    let mut components = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        if let Some(cap) = ex.import_es.captures(line) {
            let names = extract_names(&cap[1]);
            imports.push(ImportRecord {
                source: cap[2].to_string(),
                is_default: !cap[1].trim_start().starts_with('{'),
                names,
                is_dynamic: false,
                line: line_no + 1,
            });
        }
        for cap in ex.import_require.captures_iter(line) {
            imports.push(ImportRecord {
                source: cap[1].to_string(),
                names: Vec::new(),
                is_default: false,
                is_dynamic: true,
                line: line_no + 1,
            });
        }
        if let Some(cap) = ex.function_decl.captures(line) {
            let name = cap[3].to_string();
            let is_exported = cap.get(1).is_some();
            if is_exported {
                exports.push(ExportedSymbol { name: name.clone(), kind: ExportKind::Function });
            }
            functions.push(FunctionRecord { name, is_async: cap.get(2).is_some(), is_exported });
        }
        if let Some(cap) = ex.arrow_const.captures(line) {
            let name = cap[2].to_string();
            if cap.get(1).is_some() {
                exports.push(ExportedSymbol { name: name.clone(), kind: ExportKind::Const });
            }
            if ex.component_decl.is_match(&name) {
                components.push(name.clone());
            }
            functions.push(FunctionRecord { name, is_async: cap.get(3).is_some(), is_exported: cap.get(1).is_some() });
        }
        if let Some(cap) = ex.class_decl.captures(line) {
            let name = cap[2].to_string();
            if cap.get(1).is_some() {
                exports.push(ExportedSymbol { name: name.clone(), kind: ExportKind::Class });
            }
            classes.push(name);
        }
        if let Some(cap) = ex.type_decl.captures(line) {
            let name = cap[2].to_string();
            if cap.get(1).is_some() {
                exports.push(ExportedSymbol { name: name.clone(), kind: ExportKind::Type });
            }
            types.push(name);
        }
        if let Some(cap) = ex.export_named.captures(line) {
            let name = cap[1].to_string();
            if !exports.iter().any(|e: &ExportedSymbol| e.name == name) {
                exports.push(ExportedSymbol { name, kind: ExportKind::Variable });
            }
        }
        if let Some(cap) = ex.export_const.captures(line) {
            for name in extract_names(&cap[1]) {
                if !exports.iter().any(|e: &ExportedSymbol| e.name == name) {
                    exports.push(ExportedSymbol { name, kind: ExportKind::Variable });
                }
            }
        }
        if let Some(cap) = ex.export_default.captures(line) {
            if let Some(m) = cap.get(1) {
                exports.push(ExportedSymbol { name: m.as_str().to_string(), kind: ExportKind::Default });
            }
        }
    }

    let mut keywords: Vec<String> = Vec::new();
    for name in functions.iter().map(|f| &f.name).chain(classes.iter()).chain(components.iter()) {
        keywords.push(crate::util::wordify(name).to_lowercase());
    }
    keywords.sort();
    keywords.dedup();

    FileEntry {
        path: path.to_string(),
        mtime,
        size,
        last_parsed: now_secs(),
        exports,
        imports,
        components,
        keywords,
        functions,
        classes,
        types,
        language: Some(language_for(path).to_string()),
    }
}

/// Detect a rough tech-stack label and project type from the manifest files
/// present in the candidate set (§3 `CacheIndex.tech_stack`/`project_metadata`).
fn detect_tech_stack(candidates: &[FileCandidate]) -> (String, ProjectMetadata) {
    let names: HashSet<&str> = candidates.iter().map(|c| crate::util::filename(&c.path)).collect();
    let mut stacks: Vec<&str> = Vec::new();
    let mut project_type = None;
    let mut capabilities = Vec::new();

    if names.contains("package.json") {
        stacks.push("Node.js");
        project_type.get_or_insert("node".to_string());
        capabilities.push("npm".to_string());
    }
    if names.contains("Cargo.toml") {
        stacks.push("Rust");
        project_type.get_or_insert("rust".to_string());
        capabilities.push("cargo".to_string());
    }
    if names.contains("go.mod") {
        stacks.push("Go");
        project_type.get_or_insert("go".to_string());
    }
    if names.contains("pyproject.toml") || names.contains("setup.py") {
        stacks.push("Python");
        project_type.get_or_insert("python".to_string());
    }
    if names.contains("Gemfile") {
        stacks.push("Ruby");
        project_type.get_or_insert("ruby".to_string());
    }
    if candidates.iter().any(|c| matches!(crate::util::extension(&c.path), "ts" | "tsx")) {
        stacks.push("TypeScript");
    }
    if candidates.iter().any(|c| matches!(crate::util::extension(&c.path), "jsx" | "tsx")) {
        capabilities.push("react".to_string());
    }

    (stacks.join(" + "), ProjectMetadata { project_type, capabilities })
}

enum Delta {
    Upsert(FileEntry),
    Unchanged,
}

fn parse_candidate(root: &Path, candidate: &FileCandidate, existing: Option<&FileEntry>) -> Delta {
    let (size, mtime) = match (candidate.size, candidate.mtime) {
        (Some(s), Some(m)) => (s, m),
        _ => return Delta::Unchanged,
    };
    if let Some(prev) = existing {
        if prev.mtime == mtime && prev.size == size {
            return Delta::Unchanged;
        }
    }
    let Ok(content) = std::fs::read_to_string(root.join(&candidate.path)) else {
        return Delta::Unchanged;
    };
    Delta::Upsert(extract_file(&candidate.path, &content, mtime, size))
}

/// Incrementally refresh the index against the current candidate set:
/// parses added/modified files (bounded concurrency), drops deleted ones.
pub async fn refresh(root: &Path, candidates: &[FileCandidate]) -> crate::error::Result<CacheIndex> {
    let mut index = get_or_load(root);
    let key = root_key(root);

    let (tech_stack, project_metadata) = detect_tech_stack(candidates);
    // A changed manifest set implies the tech stack may have changed; when it
    // has, a full rebuild is cheaper and safer than trusting stale entries
    // parsed under the old stack (§4.5 invalidation).
    if !index.tech_stack.is_empty() && index.tech_stack != tech_stack {
        index.files.clear();
    }
    index.tech_stack = tech_stack;
    index.project_metadata = Some(project_metadata);

    let extractable: Vec<FileCandidate> = candidates
        .iter()
        .filter(|c| EXTRACTABLE_EXTENSIONS.contains(&crate::util::extension(&c.path)))
        .cloned()
        .collect();

    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(PARSE_CONCURRENCY));
    let mut join_set = tokio::task::JoinSet::new();
    for candidate in extractable {
        let existing = index.files.get(&candidate.path).cloned();
        let root = root.to_path_buf();
        let permit = semaphore.clone().acquire_owned().await.ok();
        join_set.spawn(async move {
            let _permit = permit;
            let delta = parse_candidate(&root, &candidate, existing.as_ref());
            (candidate.path, delta)
        });
    }

    while let Some(res) = join_set.join_next().await {
        if let Ok((path, Delta::Upsert(entry))) = res {
            index.files.insert(path, entry);
        }
    }

    let live_paths: std::collections::HashSet<&str> = candidates.iter().map(|c| c.path.as_str()).collect();
    index.files.retain(|path, _| live_paths.contains(path.as_str()));

    index.version = crate::types::INDEX_VERSION.to_string();
    index.project_root = key;
    index.last_scan = now_secs();
    index.total_files = candidates.len();

    save(root, &index)?;
    update_cache(root, index.clone());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_exports_and_components() {
        let content = "export function LoginForm() {\n  return null;\n}\n\nexport class AuthService {}\n";
        let entry = extract_file("src/auth/LoginForm.tsx", content, 0, content.len() as u64);
        assert!(entry.functions.iter().any(|f| f.name == "LoginForm"));
        assert!(entry.classes.contains(&"AuthService".to_string()));
        assert!(entry.exports.iter().any(|e| e.name == "LoginForm"));
    }

    #[test]
    fn extracts_imports() {
        let content = "import { useState } from 'react';\nconst x = require('./util');\n";
        let entry = extract_file("src/App.tsx", content, 0, content.len() as u64);
        assert_eq!(entry.imports.len(), 2);
        assert_eq!(entry.imports[0].source, "react");
        assert!(entry.imports[1].is_dynamic);
    }

    #[tokio::test]
    async fn refresh_persists_and_drops_deleted() {
        reset_process_cache();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "export function a() {}\n").unwrap();
        let meta = std::fs::metadata(dir.path().join("a.ts")).unwrap();
        let mtime = meta.modified().unwrap().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs() as i64;

        let candidates = vec![FileCandidate {
            path: "a.ts".to_string(),
            tag: crate::types::FileTag::Code,
            size: Some(meta.len()),
            mtime: Some(mtime),
        }];

        let index = refresh(dir.path(), &candidates).await.unwrap();
        assert!(index.files.contains_key("a.ts"));
        assert!(index_path(dir.path()).exists());

        let index2 = refresh(dir.path(), &[]).await.unwrap();
        assert!(index2.files.is_empty());
    }
}
