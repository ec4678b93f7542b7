//! Top-level orchestration (§5) — wires enumeration, intent analysis,
//! scoring, the semantic index, smart filtering, impact analysis, and
//! session biasing into one query. A single timeout wraps the whole
//! pipeline: on expiry the caller gets an empty result, never a partial one.

use crate::config::RuntimeConfig;
use crate::types::{FileTag, IntentAnalysis, SearchMetadata, SearchResult, Session};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    Code,
    Config,
    Test,
}

impl TypeFilter {
    fn tag(self) -> FileTag {
        match self {
            TypeFilter::Code => FileTag::Code,
            TypeFilter::Config => FileTag::Config,
            TypeFilter::Test => FileTag::Test,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub root: PathBuf,
    pub query: String,
    pub type_filter: Option<TypeFilter>,
    pub include_generated: bool,
    pub impact: bool,
    pub session_id: Option<String>,
}

fn vcs_modified_files(root: &std::path::Path) -> HashSet<String> {
    let Ok(repo) = git2::Repository::discover(root) else { return HashSet::new() };
    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true);
    let Ok(statuses) = repo.statuses(Some(&mut opts)) else { return HashSet::new() };
    statuses
        .iter()
        .filter(|e| {
            e.status().intersects(
                git2::Status::WT_MODIFIED
                    | git2::Status::WT_NEW
                    | git2::Status::INDEX_MODIFIED
                    | git2::Status::INDEX_NEW,
            )
        })
        .filter_map(|e| e.path().map(|p| p.to_string()))
        .collect()
}

async fn run(options: SearchOptions) -> crate::error::Result<SearchResult> {
    let config = RuntimeConfig::from_env();
    let intent: IntentAnalysis = crate::intent::analyze(&options.query);

    let mut candidates = crate::enumerator::enumerate(&options.root, &config).await?;
    if !options.include_generated {
        candidates.retain(|c| c.tag != FileTag::Generated);
    }

    let session: Option<Session> = options
        .session_id
        .as_deref()
        .and_then(|id| crate::session::load(&options.root, id).ok());
    let session_boosts = session.as_ref().map(crate::session::boost_map).unwrap_or_default();

    let mut scored = crate::score::score_candidates(&candidates, &intent, &session_boosts);

    if let Some(filter) = options.type_filter {
        let tag = filter.tag();
        scored.retain(|f| crate::classify::classify(&f.path) == tag);
    }

    let index = crate::index::refresh(&options.root, &candidates).await?;

    let modified = vcs_modified_files(&options.root);
    let now = crate::config::now_secs();
    crate::smart_filter::apply_recency_boost(&mut scored, &modified, &index, now);

    // Smart Filter (§4.6) rescores using the index instead of the raw
    // structural score once intent confidence and category justify it.
    if intent.confidence > 0.5 && intent.category != crate::types::IntentCategory::General {
        crate::smart_filter::apply_index_rescoring(&mut scored, &intent.keywords, &index);
        scored.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.path.cmp(&b.path))
        });
    }

    if let Some(session) = &session {
        let previous_keywords: Vec<String> =
            session.query_history.last().map(|q| crate::intent::tokenize(&q.query)).unwrap_or_default();
        let carryover_paths: HashSet<String> = session.files.keys().cloned().collect();
        scored = crate::smart_filter::apply_context_carryover(scored, &intent.keywords, &previous_keywords, &carryover_paths);
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.path.cmp(&b.path)));
    }

    // `MANTIC_MAX_FILES` (§6) bounds the returned list; the scorer's own
    // top-100 cutoff (§4.4) already applies upstream, so this only bites
    // when the caller tightens the bound below that default.
    scored.truncate(config.max_files);

    if options.impact {
        let graph = crate::graph::build_graph(&index);
        let candidate_paths: Vec<String> = candidates.iter().map(|c| c.path.clone()).collect();
        for file in scored.iter_mut() {
            file.impact = Some(crate::graph::compute_impact(&file.path, &graph, &candidate_paths));
        }
    }

    crate::smart_filter::annotate_top_files(&options.root, &mut scored, &intent.keywords);

    if let Some(session) = &session {
        let returned: Vec<String> = scored.iter().map(|f| f.path.clone()).collect();
        let _ = crate::session::record_query(&options.root, &session.meta.id, &options.query, returned);
    }

    let known_paths: HashSet<String> = candidates.iter().map(|c| c.path.clone()).collect();
    let mut indexed_symbols: HashSet<String> = HashSet::new();
    for entry in index.files.values() {
        indexed_symbols.extend(entry.functions.iter().map(|f| f.name.clone()));
        indexed_symbols.extend(entry.classes.iter().cloned());
        indexed_symbols.extend(entry.components.iter().cloned());
    }

    let metadata = SearchMetadata {
        project_type: index.project_metadata.as_ref().and_then(|m| m.project_type.clone()),
        tech_stack: if index.tech_stack.is_empty() { None } else { Some(index.tech_stack.clone()) },
        total_scanned: candidates.len(),
        files_returned: scored.len(),
        time_ms: 0,
        has_git_changes: !modified.is_empty(),
    };
    let git_state = if modified.is_empty() { None } else { Some(modified.into_iter().collect()) };

    Ok(crate::context::assemble(options.query.clone(), intent, scored, metadata, git_state, &known_paths, &indexed_symbols))
}

/// Run the full search pipeline for `options`, bounded by the configured
/// overall timeout (§5). A timeout yields an empty result, not a partial one.
pub async fn search(options: SearchOptions) -> crate::error::Result<SearchResult> {
    let config = RuntimeConfig::from_env();
    let query = options.query.clone();
    let start = std::time::Instant::now();
    let outcome = match tokio::time::timeout(config.timeout, run(options)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("pipeline timed out, returning empty result");
            Ok(empty_result(query))
        }
    };
    outcome.map(|mut result| {
        result.metadata.time_ms = start.elapsed().as_millis() as u64;
        result
    })
}

fn empty_result(query: String) -> SearchResult {
    let intent = crate::intent::analyze(&query);
    SearchResult {
        query,
        intent,
        files: Vec::new(),
        metadata: SearchMetadata {
            project_type: None,
            tech_stack: None,
            total_scanned: 0,
            files_returned: 0,
            time_ms: 0,
            has_git_changes: false,
        },
        git_state: None,
        warnings: Vec::new(),
        validation: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn search_ranks_matching_file_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/auth")).unwrap();
        fs::write(dir.path().join("src/auth/login.ts"), "export function login() {}\n").unwrap();
        fs::write(dir.path().join("src/auth/logout.ts"), "export function logout() {}\n").unwrap();

        let options = SearchOptions {
            root: dir.path().to_path_buf(),
            query: "login".to_string(),
            type_filter: None,
            include_generated: false,
            impact: false,
            session_id: None,
        };
        let result = search(options).await.unwrap();
        assert!(!result.files.is_empty());
        assert_eq!(result.files[0].path, "src/auth/login.ts");
    }
}
