//! Dependency Graph & Impact Analyser (§4.7) — builds an ephemeral per-query
//! import graph from the semantic index and computes blast-radius impact for
//! individual files.

use crate::classify::canonical_basename;
use crate::types::{BlastRadiusBucket, CacheIndex, DependencyGraph, FileNode, FileTag, ImpactInfo};
use std::collections::HashSet;

const IMPORT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", ""];
const DIRECT_DEPENDENTS_CAP: usize = 20;
const INDIRECT_DEPENDENTS_CAP: usize = 10;
const RELATED_CONFIG_CAP: usize = 5;

/// Resolve an import source written from `from_path` to a project-relative
/// path present in `known_paths`, trying the `@/` → `src/` alias, relative
/// traversal, and a fixed extension/index-file search order (§4.7).
pub fn resolve_import(from_path: &str, source: &str, known_paths: &HashSet<String>) -> Option<String> {
    if !(source.starts_with('.') || source.starts_with('@')) {
        return None; // external package, not part of the local graph
    }

    let base = if let Some(rest) = source.strip_prefix("@/") {
        format!("src/{rest}")
    } else {
        let from_dir = from_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        join_relative(from_dir, source)
    };

    for ext in IMPORT_EXTENSIONS {
        let candidate = if ext.is_empty() { base.clone() } else { format!("{base}.{ext}") };
        if known_paths.contains(&candidate) {
            return Some(candidate);
        }
    }
    for ext in IMPORT_EXTENSIONS.iter().filter(|e| !e.is_empty()) {
        let candidate = format!("{base}/index.{ext}");
        if known_paths.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn join_relative(from_dir: &str, source: &str) -> String {
    let mut segments: Vec<&str> = if from_dir.is_empty() { Vec::new() } else { from_dir.split('/').collect() };
    for part in source.split('/') {
        match part {
            "." | "" => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Build the ephemeral dependency graph for the current candidate set from
/// the already-extracted semantic index (§4.7).
pub fn build_graph(index: &CacheIndex) -> DependencyGraph {
    let known_paths: HashSet<String> = index.files.keys().cloned().collect();
    let mut graph = DependencyGraph::default();

    for (path, entry) in &index.files {
        let mut node = FileNode {
            imports: Vec::new(),
            exports: entry.exports.iter().map(|e| e.name.clone()).collect(),
            dependents: Vec::new(),
        };
        for import in &entry.imports {
            if let Some(resolved) = resolve_import(path, &import.source, &known_paths) {
                node.imports.push(resolved);
            }
        }
        graph.nodes.insert(path.clone(), node);
    }

    for (path, node) in &graph.nodes {
        for imported in &node.imports {
            graph.reverse.entry(imported.clone()).or_default().insert(path.clone());
        }
    }

    graph
}

/// Dependents of direct dependents, one hop beyond the direct set, minus the
/// direct set and the primary file itself (§4.7) — not a transitive closure.
fn indirect_dependents(graph: &DependencyGraph, path: &str, direct: &HashSet<String>) -> Vec<String> {
    let mut seen: HashSet<String> = direct.clone();
    seen.insert(path.to_string());
    let mut indirect = Vec::new();

    for dependent in direct {
        let Some(next) = graph.reverse.get(dependent) else { continue };
        for dep in next {
            if seen.insert(dep.clone()) {
                indirect.push(dep.clone());
                if indirect.len() >= INDIRECT_DEPENDENTS_CAP {
                    return indirect;
                }
            }
        }
    }
    indirect
}

fn related_tests(path: &str, candidate_paths: &[String]) -> Vec<String> {
    let canonical = canonical_basename(path);
    candidate_paths
        .iter()
        .filter(|p| *p != path && crate::classify::classify(p) == FileTag::Test && canonical_basename(p) == canonical)
        .cloned()
        .collect()
}

fn related_config(path: &str, candidate_paths: &[String]) -> Vec<String> {
    let dir = path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
    let mut configs: Vec<String> = candidate_paths
        .iter()
        .filter(|p| {
            let p_dir = p.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
            p_dir == dir && crate::classify::classify(p) == FileTag::Config
        })
        .cloned()
        .collect();
    configs.sort();
    configs.truncate(RELATED_CONFIG_CAP);
    configs
}

/// `min(100, 10·|direct| + 3·|indirect| + 2·|tests|)` (§4.7). `direct_count`
/// is the full reverse-dependent count, not the capped/truncated list.
fn blast_radius_score(direct_count: usize, indirect_count: usize, test_count: usize) -> u32 {
    let raw = direct_count as f64 * 10.0 + indirect_count as f64 * 3.0 + test_count as f64 * 2.0;
    raw.round().clamp(0.0, 100.0) as u32
}

fn warnings_for(
    direct_count: usize,
    tag: FileTag,
    tests: &[String],
    bucket: BlastRadiusBucket,
) -> Vec<String> {
    let mut warnings = Vec::new();
    if direct_count == 0 && tag != FileTag::Test {
        warnings.push("possibly dead code".to_string());
    }
    if direct_count > 20 {
        warnings.push("high coupling".to_string());
    }
    if tests.is_empty() && bucket != BlastRadiusBucket::Small {
        warnings.push("no tests found".to_string());
    }
    if bucket == BlastRadiusBucket::Critical {
        warnings.push("proceed with caution".to_string());
    }
    warnings
}

/// Compute the impact summary for a single file against the current graph
/// and the full candidate path list (§4.7). `candidate_paths` is the whole
/// scan's candidate set, not just the subset that got semantically indexed,
/// so related tests/config in non-TS/JS files (e.g. `.json`/`.yaml`) are
/// still found.
pub fn compute_impact(path: &str, graph: &DependencyGraph, candidate_paths: &[String]) -> ImpactInfo {
    let direct_set: HashSet<String> = graph.reverse.get(path).cloned().unwrap_or_default();
    let direct_count = direct_set.len();
    let mut direct: Vec<String> = direct_set.iter().cloned().collect();
    direct.sort();
    direct.truncate(DIRECT_DEPENDENTS_CAP);

    let indirect = indirect_dependents(graph, path, &direct_set);
    let tests = related_tests(path, candidate_paths);
    let config = related_config(path, candidate_paths);

    let score = blast_radius_score(direct_count, indirect.len(), tests.len());
    let bucket = BlastRadiusBucket::from_score(score);
    let tag = crate::classify::classify(path);
    let warnings = warnings_for(direct_count, tag, &tests, bucket);

    ImpactInfo {
        direct_dependents: direct,
        indirect_dependents: indirect,
        related_tests: tests,
        related_config: config,
        blast_radius_score: score,
        blast_radius_bucket: bucket,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExportKind, ExportedSymbol, FileEntry, ImportRecord};

    fn entry(path: &str, imports: Vec<ImportRecord>, exports: Vec<ExportedSymbol>) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            mtime: 0,
            size: 0,
            last_parsed: 0,
            exports,
            imports,
            components: Vec::new(),
            keywords: Vec::new(),
            functions: Vec::new(),
            classes: Vec::new(),
            types: Vec::new(),
            language: None,
        }
    }

    fn import(source: &str) -> ImportRecord {
        ImportRecord { source: source.to_string(), names: Vec::new(), is_default: false, is_dynamic: false, line: 1 }
    }

    #[test]
    fn resolves_relative_and_alias_imports() {
        let mut known = HashSet::new();
        known.insert("src/auth/session.ts".to_string());
        known.insert("src/util/format.ts".to_string());

        assert_eq!(
            resolve_import("src/auth/login.ts", "./session", &known),
            Some("src/auth/session.ts".to_string())
        );
        assert_eq!(
            resolve_import("src/auth/login.ts", "@/util/format", &known),
            Some("src/util/format.ts".to_string())
        );
        assert_eq!(resolve_import("src/auth/login.ts", "react", &known), None);
    }

    #[test]
    fn builds_reverse_dependents_and_blast_radius() {
        let mut index = CacheIndex::new("root".into());
        index.files.insert(
            "src/auth/session.ts".to_string(),
            entry("src/auth/session.ts", Vec::new(), vec![ExportedSymbol { name: "Session".into(), kind: ExportKind::Class }]),
        );
        index.files.insert(
            "src/auth/login.ts".to_string(),
            entry("src/auth/login.ts", vec![import("./session")], Vec::new()),
        );
        index.files.insert(
            "src/auth/logout.ts".to_string(),
            entry("src/auth/logout.ts", vec![import("./session")], Vec::new()),
        );

        let candidates: Vec<String> = index.files.keys().cloned().collect();
        let graph = build_graph(&index);
        let impact = compute_impact("src/auth/session.ts", &graph, &candidates);
        assert_eq!(impact.direct_dependents.len(), 2);
        assert!(impact.blast_radius_score > 0);
    }

    #[test]
    fn flags_dead_code_with_no_dependents() {
        let mut index = CacheIndex::new("root".into());
        index.files.insert("src/unused.ts".to_string(), entry("src/unused.ts", Vec::new(), Vec::new()));
        let candidates: Vec<String> = index.files.keys().cloned().collect();
        let graph = build_graph(&index);
        let impact = compute_impact("src/unused.ts", &graph, &candidates);
        assert!(impact.warnings.contains(&"possibly dead code".to_string()));
    }

    #[test]
    fn indirect_dependents_are_one_hop_only() {
        let mut index = CacheIndex::new("root".into());
        index.files.insert("src/core.ts".to_string(), entry("src/core.ts", Vec::new(), Vec::new()));
        index.files.insert("src/mid.ts".to_string(), entry("src/mid.ts", vec![import("./core")], Vec::new()));
        index.files.insert("src/outer.ts".to_string(), entry("src/outer.ts", vec![import("./mid")], Vec::new()));
        index.files.insert("src/outer2.ts".to_string(), entry("src/outer2.ts", vec![import("./outer")], Vec::new()));
        let candidates: Vec<String> = index.files.keys().cloned().collect();
        let graph = build_graph(&index);
        let impact = compute_impact("src/core.ts", &graph, &candidates);
        assert!(impact.indirect_dependents.contains(&"src/outer.ts".to_string()));
        assert!(!impact.indirect_dependents.contains(&"src/outer2.ts".to_string()));
    }
}
