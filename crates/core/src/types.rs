//! Data model (§3): the shapes that flow between pipeline stages.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Version string stamped into every persisted [`CacheIndex`]. Bumping this
/// invalidates all indexes written by prior builds (invariant ii, §3).
pub const INDEX_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// File classification
// ---------------------------------------------------------------------------

/// Pure classification tag for a path (§4.3). Ordering matches deprioritisation
/// priority from highest to lowest relevance weight, not declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTag {
    Code,
    Config,
    Other,
    Test,
    Docs,
    Generated,
}

impl FileTag {
    /// Deprioritisation weight used by the structural scorer (§4.3).
    pub fn priority(self) -> i32 {
        match self {
            FileTag::Code => 100,
            FileTag::Config => 50,
            FileTag::Other => 20,
            FileTag::Test => 30,
            FileTag::Docs => 10,
            FileTag::Generated => 0,
        }
    }

    /// `isCanonical := tag ∈ {code, config}` (§4.3).
    pub fn is_canonical(self) -> bool {
        matches!(self, FileTag::Code | FileTag::Config)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileTag::Code => "code",
            FileTag::Config => "config",
            FileTag::Other => "other",
            FileTag::Test => "test",
            FileTag::Docs => "docs",
            FileTag::Generated => "generated",
        }
    }
}

/// A candidate file produced by the enumerator (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCandidate {
    /// Repository-relative, forward-slash path (invariant iii).
    pub path: String,
    pub tag: FileTag,
    pub size: Option<u64>,
    /// Unix seconds, when stat-cached.
    pub mtime: Option<i64>,
}

// ---------------------------------------------------------------------------
// Intent analysis
// ---------------------------------------------------------------------------

/// The closed category set from §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentCategory {
    Ui,
    Auth,
    Styling,
    Performance,
    Backend,
    Testing,
    Config,
    General,
}

impl IntentCategory {
    pub const ALL: [IntentCategory; 7] = [
        IntentCategory::Ui,
        IntentCategory::Auth,
        IntentCategory::Styling,
        IntentCategory::Performance,
        IntentCategory::Backend,
        IntentCategory::Testing,
        IntentCategory::Config,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IntentCategory::Ui => "UI",
            IntentCategory::Auth => "auth",
            IntentCategory::Styling => "styling",
            IntentCategory::Performance => "performance",
            IntentCategory::Backend => "backend",
            IntentCategory::Testing => "testing",
            IntentCategory::Config => "config",
            IntentCategory::General => "general",
        }
    }
}

/// Extracted entities, partitioned for later hallucination detection (§4.2, §4.9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedEntities {
    pub files: Vec<String>,
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub components: Vec<String>,
    pub errors: Vec<String>,
}

impl ExtractedEntities {
    pub fn total(&self) -> usize {
        self.files.len() + self.functions.len() + self.classes.len() + self.components.len() + self.errors.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub category: IntentCategory,
    pub keywords: Vec<String>,
    pub confidence: f64,
    pub sub_category: Option<String>,
    pub entities: ExtractedEntities,
}

// ---------------------------------------------------------------------------
// Scored output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedLine {
    pub line: usize,
    pub content: String,
    pub keyword: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMetadata {
    pub bytes: u64,
    pub line_estimate: u64,
    pub token_estimate: u64,
    pub last_modified: Option<i64>,
    pub created: Option<i64>,
    pub confidence: f64,
}

impl FileMetadata {
    /// Derive size/line/token estimates from a [`FileCandidate`]'s cached
    /// stat info, without reading the file (§3, §4.4: no I/O in the hot
    /// path). `line_estimate` assumes ~40 bytes/line, `token_estimate` the
    /// common ~4 bytes/token rule of thumb; both are advisory.
    pub fn from_candidate(candidate: &FileCandidate) -> Self {
        let bytes = candidate.size.unwrap_or(0);
        Self {
            bytes,
            line_estimate: if bytes == 0 { 0 } else { (bytes / 40).max(1) },
            token_estimate: if bytes == 0 { 0 } else { (bytes / 4).max(1) },
            last_modified: candidate.mtime,
            created: None,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactInfo {
    pub direct_dependents: Vec<String>,
    pub indirect_dependents: Vec<String>,
    pub related_tests: Vec<String>,
    pub related_config: Vec<String>,
    pub blast_radius_score: u32,
    pub blast_radius_bucket: BlastRadiusBucket,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlastRadiusBucket {
    Small,
    Medium,
    Large,
    Critical,
}

impl BlastRadiusBucket {
    pub fn from_score(score: u32) -> Self {
        if score < 20 {
            BlastRadiusBucket::Small
        } else if score < 50 {
            BlastRadiusBucket::Medium
        } else if score < 80 {
            BlastRadiusBucket::Large
        } else {
            BlastRadiusBucket::Critical
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredFile {
    pub path: String,
    pub score: f64,
    pub reasons: Vec<String>,
    pub is_imported: bool,
    pub is_exported: bool,
    pub matched_lines: Option<Vec<MatchedLine>>,
    pub metadata: Option<FileMetadata>,
    pub impact: Option<ImpactInfo>,
}

impl ScoredFile {
    pub fn new(path: impl Into<String>, score: f64) -> Self {
        Self {
            path: path.into(),
            score: score.max(0.0),
            reasons: Vec::new(),
            is_imported: false,
            is_exported: false,
            matched_lines: None,
            metadata: None,
            impact: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Semantic index (persisted)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Function,
    Class,
    Const,
    Type,
    Interface,
    Default,
    Variable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedSymbol {
    pub name: String,
    pub kind: ExportKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub source: String,
    pub names: Vec<String>,
    pub is_default: bool,
    pub is_dynamic: bool,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub is_async: bool,
    pub is_exported: bool,
}

/// A single file's extracted structure, persisted inside [`CacheIndex`] (§3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub mtime: i64,
    pub size: u64,
    pub last_parsed: i64,
    pub exports: Vec<ExportedSymbol>,
    pub imports: Vec<ImportRecord>,
    pub components: Vec<String>,
    pub keywords: Vec<String>,
    pub functions: Vec<FunctionRecord>,
    pub classes: Vec<String>,
    pub types: Vec<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project_type: Option<String>,
    pub capabilities: Vec<String>,
}

/// Persisted `.{tool}/index.json` document (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheIndex {
    pub version: String,
    pub last_scan: i64,
    pub project_root: String,
    pub tech_stack: String,
    pub total_files: usize,
    pub files: HashMap<String, FileEntry>,
    pub project_metadata: Option<ProjectMetadata>,
}

impl CacheIndex {
    pub fn new(project_root: String) -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            last_scan: 0,
            project_root,
            tech_stack: String::new(),
            total_files: 0,
            files: HashMap::new(),
            project_metadata: None,
        }
    }

    /// Invariant (ii): the index is authoritative only when version and root match.
    pub fn is_authoritative(&self, project_root: &str, now: i64) -> bool {
        self.version == INDEX_VERSION
            && self.project_root == project_root
            && now.saturating_sub(self.last_scan) < 24 * 3600
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    pub name: String,
    pub created: i64,
    pub last_active: i64,
    pub query_count: u64,
    pub intent: Option<String>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFileState {
    pub view_count: u64,
    pub last_viewed: i64,
    pub relevance_score: f64,
    pub blast_radius: Option<BlastRadiusBucket>,
    pub notes: Vec<String>,
}

impl Default for SessionFileState {
    fn default() -> Self {
        Self { view_count: 0, last_viewed: 0, relevance_score: 0.0, blast_radius: None, notes: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query: String,
    pub timestamp: i64,
    pub files_returned: Vec<String>,
}

/// Full session document persisted at `.{tool}/sessions/<id>.json` (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub meta: SessionMeta,
    pub files: HashMap<String, SessionFileState>,
    pub query_history: Vec<QueryRecord>,
    pub insights: Vec<String>,
}

/// `boostFactor` row emitted by [`crate::session::SessionManager::boost_candidates`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostCandidate {
    pub path: String,
    pub boost_factor: f64,
    pub reason: String,
}

/// One viewed file passed to `record_file_views` (§4.8): carries the
/// relevance score and blast radius observed for this file at view time so
/// the session can merge in first-seen values alongside the view count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileView {
    pub path: String,
    pub relevance_score: f64,
    pub blast_radius: Option<BlastRadiusBucket>,
}

/// Legacy `.{tool}/session.json` last-query pointer (§6, §9 Open Question b).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacySessionPointer {
    pub last_request: LegacyLastRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyLastRequest {
    pub prompt: String,
    pub keywords: Vec<String>,
    pub top_files: Vec<String>,
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Dependency graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileNode {
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub dependents: Vec<String>,
}

/// Ephemeral per-query import graph (§3, §4.7).
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: BTreeMap<String, FileNode>,
    pub reverse: BTreeMap<String, HashSet<String>>,
}

// ---------------------------------------------------------------------------
// Context builder output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub entity_count: usize,
    pub found_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub kind: String,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub project_type: Option<String>,
    pub tech_stack: Option<String>,
    pub total_scanned: usize,
    pub files_returned: usize,
    pub time_ms: u64,
    pub has_git_changes: bool,
}

/// The final assembled result of one pipeline invocation (§4.9, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub intent: IntentAnalysis,
    pub files: Vec<ScoredFile>,
    pub metadata: SearchMetadata,
    pub git_state: Option<Vec<String>>,
    pub warnings: Vec<Warning>,
    pub validation: Option<ValidationResult>,
}
