//! Smart Filter (§4.6) — narrows the scored candidate set using typed
//! constraints derived from the query and index, plus recency and
//! session-context-carryover boosts. Also locates exact matching lines in
//! the final top files for citation.

use crate::types::{CacheIndex, MatchedLine, ScoredFile};
use std::collections::HashSet;

/// A typed narrowing constraint (§4.6). Each variant carries a static cost
/// (how expensive it is to evaluate) and selectivity (how much it's expected
/// to shrink the candidate set), used to pick an evaluation order.
#[derive(Debug, Clone)]
pub enum Constraint {
    Usage(String),
    Import(String),
    Export(String),
    ComponentType(String),
    Keyword(String),
    Path(String),
}

impl Constraint {
    fn cost(&self) -> f64 {
        match self {
            Constraint::Usage(_) => 8.0,
            Constraint::Import(_) => 2.0,
            Constraint::Export(_) => 2.0,
            Constraint::ComponentType(_) => 5.0,
            Constraint::Keyword(_) => 1.0,
            Constraint::Path(_) => 1.0,
        }
    }

    fn selectivity(&self) -> f64 {
        match self {
            Constraint::Usage(_) => 0.9,
            Constraint::Import(_) => 0.6,
            Constraint::Export(_) => 0.6,
            Constraint::ComponentType(_) => 0.5,
            Constraint::Keyword(_) => 0.3,
            Constraint::Path(_) => 0.4,
        }
    }

    fn ordering_score(&self) -> f64 {
        self.selectivity() / (self.cost() + 0.1)
    }

}

/// Build the constraint set for a query: one global [`Constraint::Usage`]
/// check plus per-keyword import/export/component-type/keyword/path
/// constraints (§4.6).
fn build_constraints(keywords: &[String]) -> Vec<Constraint> {
    let mut constraints = vec![Constraint::Usage(String::new())];
    for kw in keywords {
        constraints.push(Constraint::Import(kw.clone()));
        constraints.push(Constraint::Export(kw.clone()));
        constraints.push(Constraint::ComponentType(kw.clone()));
        constraints.push(Constraint::Keyword(kw.clone()));
        constraints.push(Constraint::Path(kw.clone()));
    }
    constraints
}

/// The per-constraint score contribution table (§4.6). Usage is resolved
/// separately (it is a cross-file signal, not a per-keyword one); this
/// covers the remaining five constraint kinds.
fn constraint_contribution(
    constraint: &Constraint,
    file: &ScoredFile,
    index: &CacheIndex,
) -> Option<(f64, &'static str)> {
    let entry = index.files.get(&file.path);
    match constraint {
        Constraint::Import(kw) => entry
            .is_some_and(|e| e.imports.iter().any(|im| im.source.to_lowercase().contains(&kw.to_lowercase())))
            .then_some((20.0, "imports")),
        Constraint::Export(kw) => entry
            .is_some_and(|e| e.exports.iter().any(|ex| ex.name.eq_ignore_ascii_case(kw)))
            .then_some((25.0, "exports")),
        Constraint::ComponentType(kw) => entry
            .is_some_and(|e| e.components.iter().any(|c| c.eq_ignore_ascii_case(kw)))
            .then_some((15.0, "component-match")),
        Constraint::Keyword(kw) => entry
            .is_some_and(|e| e.keywords.iter().any(|k| k.eq_ignore_ascii_case(kw)))
            .then_some((5.0, "cached-keyword")),
        Constraint::Path(kw) => {
            let stem = crate::util::stem(&file.path).to_lowercase();
            let kw_lower = kw.to_lowercase();
            if kw_lower.is_empty() {
                None
            } else if stem == kw_lower {
                Some((100.0, "exact-file"))
            } else if stem.contains(&kw_lower) {
                Some((3.0, "path-substring"))
            } else {
                None
            }
        }
        Constraint::Usage(_) => None,
    }
}

/// Whether some other indexed file's import resolves to `path`, by basename
/// (the source's last path segment, extension stripped, compared to the
/// candidate's stem) — the usage heuristic of §4.6.
fn is_used_elsewhere(path: &str, index: &CacheIndex) -> bool {
    let stem = crate::util::stem(path).to_lowercase();
    index.files.iter().any(|(other_path, entry)| {
        other_path != path
            && entry.imports.iter().any(|im| {
                let source_tail = im.source.rsplit('/').next().unwrap_or(&im.source);
                let source_stem = source_tail.rsplit_once('.').map(|(s, _)| s).unwrap_or(source_tail);
                source_stem.to_lowercase() == stem
            })
    })
}

/// Apply the usage constraint globally: `+30` when the file both exports
/// something and is imported elsewhere, `-50` otherwise (§4.6).
fn apply_usage_signal(files: &mut [ScoredFile], index: &CacheIndex) {
    for file in files.iter_mut() {
        let Some(entry) = index.files.get(&file.path) else { continue };
        let has_export = !entry.exports.is_empty();
        let used = has_export && is_used_elsewhere(&file.path, index);
        if used {
            file.score += 30.0;
            file.reasons.push("usage".to_string());
            file.is_exported = true;
            file.is_imported = true;
        } else {
            file.score -= 50.0;
        }
        file.score = file.score.max(0.0);
    }
}

/// Index-aware rescoring (§4.6): applied when the index is fresh and
/// intent confidence/category justify it (gated by the caller). Usage
/// runs first for its high selectivity, then the remaining per-keyword
/// constraints in selectivity/cost order, stopping once at least five
/// candidates clear score 50.
pub fn apply_index_rescoring(files: &mut [ScoredFile], keywords: &[String], index: &CacheIndex) {
    apply_usage_signal(files, index);

    let constraints = build_constraints(keywords);
    let mut ordered: Vec<&Constraint> =
        constraints.iter().filter(|c| !matches!(c, Constraint::Usage(_))).collect();
    ordered.sort_by(|a, b| b.ordering_score().partial_cmp(&a.ordering_score()).unwrap_or(std::cmp::Ordering::Equal));

    let mut high_score_count = files.iter().filter(|f| f.score > 50.0).count();
    for constraint in ordered {
        if high_score_count >= 5 {
            break;
        }
        for file in files.iter_mut() {
            if let Some((contribution, tag)) = constraint_contribution(constraint, file, index) {
                let was_high = file.score > 50.0;
                file.score += contribution;
                file.reasons.push(tag.to_string());
                if matches!(constraint, Constraint::Import(_)) {
                    file.is_imported = true;
                }
                if matches!(constraint, Constraint::Export(_)) {
                    file.is_exported = true;
                }
                if !was_high && file.score > 50.0 {
                    high_score_count += 1;
                }
            }
        }
    }
}

const RECENCY_WINDOW_SECS: i64 = 10 * 60;
const RECENCY_BOOST: f64 = 200.0;

/// Boost files that changed recently: present in `vcs_modified` or whose
/// index entry was parsed within the last ten minutes (§4.6).
pub fn apply_recency_boost(files: &mut [ScoredFile], vcs_modified: &HashSet<String>, index: &CacheIndex, now: i64) {
    for file in files.iter_mut() {
        let recently_parsed = index
            .files
            .get(&file.path)
            .is_some_and(|e| now.saturating_sub(e.last_parsed) < RECENCY_WINDOW_SECS);
        if vcs_modified.contains(&file.path) || recently_parsed {
            file.score += RECENCY_BOOST;
            file.reasons.push("recently-modified".to_string());
        }
    }
}

const CARRYOVER_EXCLUSIVE_THRESHOLD: f64 = 0.5;
const CARRYOVER_SOFT_BOOST: f64 = 150.0;

/// Decide how much the previous session's keywords should steer this query:
/// high keyword overlap becomes an exclusive filter (only carried-over files
/// survive), partial overlap becomes a soft additive boost, no overlap is a
/// no-op (§4.6).
pub fn apply_context_carryover(
    files: Vec<ScoredFile>,
    current_keywords: &[String],
    previous_keywords: &[String],
    carryover_paths: &HashSet<String>,
) -> Vec<ScoredFile> {
    if previous_keywords.is_empty() || carryover_paths.is_empty() {
        return files;
    }
    let current: HashSet<String> = current_keywords.iter().map(|k| k.to_lowercase()).collect();
    let previous: HashSet<String> = previous_keywords.iter().map(|k| k.to_lowercase()).collect();
    let overlap = current.intersection(&previous).count();
    let ratio = overlap as f64 / previous.len().max(1) as f64;

    if ratio >= CARRYOVER_EXCLUSIVE_THRESHOLD {
        let exclusive: Vec<ScoredFile> = files.iter().filter(|f| carryover_paths.contains(&f.path)).cloned().collect();
        if !exclusive.is_empty() {
            return exclusive;
        }
        files
    } else if ratio > 0.0 {
        files
            .into_iter()
            .map(|mut f| {
                if carryover_paths.contains(&f.path) {
                    f.score += CARRYOVER_SOFT_BOOST;
                    f.reasons.push("session_context_carryover".to_string());
                }
                f
            })
            .collect()
    } else {
        files
    }
}

const EXACT_LINE_CANDIDATE_FILES: usize = 10;
const MAX_OCCURRENCES_PER_FILE: usize = 3;

const GENERIC_STOP_WORDS: &[&str] = &["component", "page", "view", "the", "function", "handler"];

fn looks_like_filename(token: &str) -> bool {
    token.contains('.') && token.rsplit('.').next().is_some_and(|ext| ext.len() <= 4 && ext.chars().all(|c| c.is_alphanumeric()))
}

/// Pick the query's primary keyword for exact-line matching: the first
/// keyword that isn't a generic UI term or filename-shaped token (§4.6).
pub fn primary_keyword(keywords: &[String]) -> Option<&String> {
    keywords
        .iter()
        .find(|k| !GENERIC_STOP_WORDS.contains(&k.to_lowercase().as_str()) && !looks_like_filename(k))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LinePriority {
    Other = 0,
    StringLiteral = 1,
    PropBearing = 2,
    JsxText = 3,
}

fn classify_line(line: &str) -> LinePriority {
    let trimmed = line.trim();
    if trimmed.starts_with('<') && !trimmed.contains('{') {
        LinePriority::JsxText
    } else if trimmed.contains('=') && (trimmed.contains('"') || trimmed.contains('\'')) && trimmed.contains('<') {
        LinePriority::PropBearing
    } else if trimmed.contains('"') || trimmed.contains('\'') {
        LinePriority::StringLiteral
    } else {
        LinePriority::Other
    }
}

/// Scan a file's content for the keyword, ranking candidate lines by
/// JSX text > prop-bearing line > string literal > other, capped at
/// [`MAX_OCCURRENCES_PER_FILE`] (§4.6).
pub fn find_matched_lines(content: &str, keyword: &str) -> Vec<MatchedLine> {
    let needle = keyword.to_lowercase();
    let mut candidates: Vec<(LinePriority, usize, String)> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| line.to_lowercase().contains(&needle))
        .map(|(i, line)| (classify_line(line), i + 1, line.trim().to_string()))
        .collect();

    candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    candidates
        .into_iter()
        .take(MAX_OCCURRENCES_PER_FILE)
        .map(|(_, line, content)| MatchedLine { line, content, keyword: keyword.to_string() })
        .collect()
}

/// Attach matched lines to the top files for a query, reading file content
/// only for the small head of the ranked list (§4.6).
pub fn annotate_top_files(root: &std::path::Path, files: &mut [ScoredFile], keywords: &[String]) {
    let Some(keyword) = primary_keyword(keywords) else { return };
    for file in files.iter_mut().take(EXACT_LINE_CANDIDATE_FILES) {
        if let Ok(content) = std::fs::read_to_string(root.join(&file.path)) {
            let matched = find_matched_lines(&content, keyword);
            if !matched.is_empty() {
                file.matched_lines = Some(matched);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileTag;

    fn scored(path: &str, score: f64) -> ScoredFile {
        let mut f = ScoredFile::new(path, score);
        f.reasons = Vec::new();
        let _ = FileTag::Code;
        f
    }

    #[test]
    fn constraints_order_by_selectivity_over_cost() {
        let keyword = Constraint::Keyword("x".into());
        let usage = Constraint::Usage("x".into());
        assert!(usage.ordering_score() > keyword.ordering_score());
    }

    #[test]
    fn recency_boost_applies_to_modified_files() {
        let mut files = vec![scored("a.ts", 10.0), scored("b.ts", 10.0)];
        let mut modified = HashSet::new();
        modified.insert("a.ts".to_string());
        let index = CacheIndex::new("root".into());
        apply_recency_boost(&mut files, &modified, &index, 1000);
        assert!(files[0].score > files[1].score);
    }

    #[test]
    fn carryover_exclusive_above_threshold() {
        let files = vec![scored("a.ts", 10.0), scored("b.ts", 20.0)];
        let mut carryover = HashSet::new();
        carryover.insert("a.ts".to_string());
        let result = apply_context_carryover(
            files,
            &["session".into(), "token".into()],
            &["session".into(), "token".into()],
            &carryover,
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, "a.ts");
    }

    #[test]
    fn carryover_soft_boost_below_threshold() {
        let files = vec![scored("a.ts", 10.0), scored("b.ts", 10.0)];
        let mut carryover = HashSet::new();
        carryover.insert("a.ts".to_string());
        let result = apply_context_carryover(
            files,
            &["session".into()],
            &["session".into(), "token".into(), "auth".into(), "login".into()],
            &carryover,
        );
        let a = result.iter().find(|f| f.path == "a.ts").unwrap();
        let b = result.iter().find(|f| f.path == "b.ts").unwrap();
        assert!(a.score > b.score);
    }

    #[test]
    fn exact_line_prioritizes_jsx_over_string_literal() {
        let content = "const msg = \"session expired\";\n<div>session expired</div>\n";
        let matched = find_matched_lines(content, "session");
        assert_eq!(matched[0].content, "<div>session expired</div>");
    }

    #[test]
    fn primary_keyword_skips_generic_terms() {
        let keywords = vec!["component".to_string(), "session".to_string()];
        assert_eq!(primary_keyword(&keywords), Some(&"session".to_string()));
    }

    fn entry_with(
        path: &str,
        exports: Vec<&str>,
        imports: Vec<(&str, &str)>,
    ) -> crate::types::FileEntry {
        use crate::types::{ExportKind, ExportedSymbol, ImportRecord};
        crate::types::FileEntry {
            path: path.to_string(),
            mtime: 0,
            size: 0,
            last_parsed: 0,
            exports: exports
                .into_iter()
                .map(|name| ExportedSymbol { name: name.to_string(), kind: ExportKind::Function })
                .collect(),
            imports: imports
                .into_iter()
                .map(|(from, source)| ImportRecord {
                    source: source.to_string(),
                    names: vec![from.to_string()],
                    is_default: false,
                    is_dynamic: false,
                    line: 1,
                })
                .collect(),
            components: Vec::new(),
            keywords: Vec::new(),
            functions: Vec::new(),
            classes: Vec::new(),
            types: Vec::new(),
            language: Some("typescript".to_string()),
        }
    }

    #[test]
    fn usage_signal_rewards_files_imported_elsewhere() {
        let mut index = CacheIndex::new("root".into());
        index.files.insert("src/auth/login.ts".to_string(), entry_with("src/auth/login.ts", vec!["login"], vec![]));
        index.files.insert(
            "src/auth/app.ts".to_string(),
            entry_with("src/auth/app.ts", vec![], vec![("login", "./login")]),
        );
        index.files.insert("src/auth/orphan.ts".to_string(), entry_with("src/auth/orphan.ts", vec!["orphan"], vec![]));

        let mut files = vec![scored("src/auth/login.ts", 10.0), scored("src/auth/orphan.ts", 10.0)];
        apply_index_rescoring(&mut files, &["login".to_string()], &index);

        let login = files.iter().find(|f| f.path == "src/auth/login.ts").unwrap();
        let orphan = files.iter().find(|f| f.path == "src/auth/orphan.ts").unwrap();
        assert!(login.is_exported);
        assert!(login.is_imported);
        assert!(login.score > orphan.score);
    }

    #[test]
    fn export_constraint_boosts_matching_file() {
        let mut index = CacheIndex::new("root".into());
        index.files.insert("src/auth/login.ts".to_string(), entry_with("src/auth/login.ts", vec!["login"], vec![]));
        let mut files = vec![scored("src/auth/login.ts", 10.0)];
        apply_index_rescoring(&mut files, &["login".to_string()], &index);
        assert!(files[0].reasons.iter().any(|r| r == "exports"));
    }
}
