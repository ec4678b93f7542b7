//! Structural Scorer (§4.4) — ranks [`FileCandidate`]s against an
//! [`IntentAnalysis`] using only path/filename/metadata signals. Never reads
//! file contents.

use crate::types::{FileCandidate, FileMetadata, FileTag, IntentAnalysis, IntentCategory, ScoredFile};
use crate::util::{depth, extension, filename, stem, wordify};
use rayon::prelude::*;
use std::collections::HashMap;

const ELIMINATED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "pdf", "zip", "tar", "gz", "7z", "woff",
    "woff2", "ttf", "eot", "mp4", "mp3", "wav", "mov", "exe", "dll", "so", "dylib", "bin", "lock",
    "wasm", "class", "jar", "log",
];

const ELIMINATED_BASENAMES: &[&str] =
    &["package-lock.json", "yarn.lock", "pnpm-lock.yaml", "Gemfile.lock", "Cargo.lock"];

const DEPTH_PENALTY_THRESHOLD: usize = 5;
const TOP_N: usize = 100;

const BUSINESS_LOGIC_SUFFIXES: &[&str] = &[
    ".service.", ".controller.", ".handler.", ".repository.", ".manager.", ".provider.",
    ".helper.", ".util.", ".utils.", ".model.", ".schema.",
];

const BOILERPLATE_STEMS: &[&str] = &["page", "layout", "route", "index", "app", "main"];

const IMPLEMENTATION_DIRS: &[&str] =
    &["src", "lib", "modules", "services", "api", "server", "core", "features"];

const IMPORTANT_NO_EXT_CONFIG: &[&str] =
    &["Dockerfile", "Makefile", "Procfile", "Rakefile", "Gemfile", "Vagrantfile"];

/// Category → {directory-prefix → weight in [0,1]} table (§4.4). Matches
/// either at the start of the path or as an interior segment; multiple
/// matches accumulate.
fn directory_weights(category: IntentCategory) -> &'static [(&'static str, f64)] {
    match category {
        IntentCategory::Ui => &[
            ("components", 1.0),
            ("pages", 0.9),
            ("views", 0.8),
            ("screens", 0.7),
            ("ui", 0.9),
            ("widgets", 0.6),
        ],
        IntentCategory::Auth => &[
            ("auth", 1.0),
            ("session", 0.7),
            ("sessions", 0.7),
            ("login", 0.6),
            ("accounts", 0.6),
            ("identity", 0.6),
        ],
        IntentCategory::Styling => {
            &[("styles", 1.0), ("css", 0.8), ("theme", 0.9), ("themes", 0.9), ("scss", 0.7)]
        }
        IntentCategory::Performance => {
            &[("perf", 1.0), ("performance", 1.0), ("cache", 0.8), ("caching", 0.8)]
        }
        IntentCategory::Backend => &[
            ("api", 1.0),
            ("server", 0.9),
            ("backend", 0.9),
            ("controllers", 0.8),
            ("routes", 0.8),
            ("services", 0.8),
            ("handlers", 0.7),
            ("packages", 0.5),
            ("apps", 0.5),
            ("features", 0.5),
        ],
        IntentCategory::Testing => {
            &[("test", 1.0), ("tests", 1.0), ("spec", 0.8), ("specs", 0.8), ("__tests__", 0.9), ("e2e", 0.7)]
        }
        IntentCategory::Config => &[("config", 1.0), ("configs", 1.0), ("settings", 0.8)],
        IntentCategory::General => &[],
    }
}

fn extension_weight(name: &str, ext: &str) -> f64 {
    match ext {
        "ts" | "tsx" => 1.0,
        "js" | "jsx" => 0.9,
        "py" | "go" | "rs" | "c" | "cc" | "cpp" | "cxx" => 1.0,
        "md" | "mdx" => 0.05,
        "yml" | "yaml" => 0.8,
        "" if IMPORTANT_NO_EXT_CONFIG.contains(&name) => 1.0,
        _ => 0.5,
    }
}

/// Highest-tier filename-keyword match per keyword (exact > whole-word >
/// substring); non-implementation files (test/docs/other) earn the smaller
/// parenthetical weight (§4.4).
fn filename_signal(
    name_lower: &str,
    keywords: &[String],
    non_implementation: bool,
) -> (f64, Vec<String>) {
    let mut score = 0.0;
    let mut reasons = Vec::new();
    let words = wordify(name_lower);
    for kw in keywords {
        let kw_lower = kw.to_lowercase();
        if kw_lower.is_empty() {
            continue;
        }
        let stem_lower = name_lower.rsplit_once('.').map(|(s, _)| s).unwrap_or(name_lower);
        if stem_lower == kw_lower {
            score += if non_implementation { 10.0 } else { 100.0 };
            reasons.push(format!("exact-file:{kw}"));
        } else if words.split(' ').any(|w| w.eq_ignore_ascii_case(&kw_lower)) {
            score += if non_implementation { 3.0 } else { 30.0 };
            reasons.push(format!("word-match:{kw}"));
        } else if name_lower.contains(&kw_lower) {
            score += if non_implementation { 5.0 } else { 50.0 };
            reasons.push(format!("filename-match:{kw}"));
        }
    }
    (score, reasons)
}

/// Sum of `20 × weight` for every matching directory prefix (§4.4).
fn directory_signal(path: &str, category: IntentCategory) -> (f64, Vec<&'static str>) {
    let mut score = 0.0;
    let mut reasons = Vec::new();
    let lower = path.to_lowercase();
    let segments: Vec<&str> = lower.split('/').collect();
    for (kw, weight) in directory_weights(category) {
        if segments.iter().any(|seg| seg == kw) {
            score += 20.0 * weight;
            reasons.push("directory-weight");
        }
    }
    (score, reasons)
}

fn is_under_implementation_dir(path: &str) -> bool {
    path.split('/').any(|seg| IMPLEMENTATION_DIRS.contains(&seg))
}

fn score_single(
    candidate: &FileCandidate,
    intent: &IntentAnalysis,
    session_boosts: &HashMap<String, f64>,
) -> ScoredFile {
    let path = candidate.path.as_str();
    let name = filename(path);
    let name_lower = name.to_lowercase();
    let st = stem(path);
    let lower_path = path.to_lowercase();
    let ext = extension(path);
    let non_implementation = !candidate.tag.is_canonical();

    let mut reasons: Vec<String> = Vec::new();

    let (fname_score, fname_reasons) =
        filename_signal(&name_lower, &intent.keywords, non_implementation);
    let mut score = fname_score;
    reasons.extend(fname_reasons);

    let (dir_score, dir_reasons) = directory_signal(path, intent.category);
    score += dir_score;
    reasons.extend(dir_reasons.into_iter().map(str::to_string));

    if is_under_implementation_dir(path) {
        score += 40.0;
        reasons.push("impl-dir".to_string());
    }

    if BUSINESS_LOGIC_SUFFIXES.iter().any(|s| lower_path.contains(s)) {
        score *= 1.5;
        reasons.push("business-logic".to_string());
    }

    let stem_lower = st.to_lowercase();
    if BOILERPLATE_STEMS.contains(&stem_lower.as_str()) {
        score *= 0.3;
        reasons.push("boilerplate".to_string());
    }

    score *= extension_weight(name, ext);

    let d = depth(path);
    if d > DEPTH_PENALTY_THRESHOLD {
        score -= (d - DEPTH_PENALTY_THRESHOLD) as f64;
    }

    match candidate.tag {
        FileTag::Code | FileTag::Config => {
            score += 30.0;
            reasons.push("canonical".to_string());
        }
        FileTag::Test => {
            score -= 40.0;
        }
        FileTag::Docs => {
            score -= 50.0;
        }
        FileTag::Other | FileTag::Generated => {}
    }

    score = score.max(0.0);

    if let Some(boost) = session_boosts.get(path) {
        score += boost;
        reasons.push("context-carryover".to_string());
    }

    let mut scored = ScoredFile::new(path, score.max(0.0));
    scored.reasons = reasons;
    scored.metadata = Some(FileMetadata::from_candidate(candidate));
    scored
}

fn is_eliminated(candidate: &FileCandidate) -> bool {
    let ext = extension(&candidate.path);
    if ELIMINATED_EXTENSIONS.contains(&ext) {
        return true;
    }
    ELIMINATED_BASENAMES.contains(&filename(&candidate.path))
}

/// Score every surviving candidate and return the top [`TOP_N`] sorted by
/// score descending, path ascending on ties (§4.4).
pub fn score_candidates(
    candidates: &[FileCandidate],
    intent: &IntentAnalysis,
    session_boosts: &HashMap<String, f64>,
) -> Vec<ScoredFile> {
    // Filtering first (cheap, sequential) keeps the parallel map's output
    // order stable and aligned with `candidates`, so the later sort is the
    // only source of nondeterminism, and that sort is itself stable.
    let survivors: Vec<&FileCandidate> = candidates.iter().filter(|c| !is_eliminated(c)).collect();
    let mut scored: Vec<ScoredFile> =
        survivors.par_iter().map(|c| score_single(c, intent, session_boosts)).collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    scored.truncate(TOP_N);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtractedEntities;

    fn candidate(path: &str, tag: FileTag) -> FileCandidate {
        FileCandidate { path: path.to_string(), tag, size: Some(512), mtime: Some(0) }
    }

    fn intent(category: IntentCategory, keywords: &[&str]) -> IntentAnalysis {
        IntentAnalysis {
            category,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            confidence: 0.9,
            sub_category: None,
            entities: ExtractedEntities::default(),
        }
    }

    #[test]
    fn exact_filename_match_outranks_substring() {
        let candidates = vec![
            candidate("src/auth/login.ts", FileTag::Code),
            candidate("src/auth/login-helpers.ts", FileTag::Code),
        ];
        let intent = intent(IntentCategory::Auth, &["login"]);
        let result = score_candidates(&candidates, &intent, &HashMap::new());
        assert_eq!(result[0].path, "src/auth/login.ts");
        assert!(result[0].score > result[1].score);
    }

    #[test]
    fn test_files_rank_below_implementation() {
        let candidates = vec![
            candidate("src/auth/login.ts", FileTag::Code),
            candidate("src/auth/login.test.ts", FileTag::Test),
        ];
        let intent = intent(IntentCategory::Auth, &["login"]);
        let result = score_candidates(&candidates, &intent, &HashMap::new());
        let impl_score = result.iter().find(|f| f.path.ends_with("login.ts")).unwrap().score;
        let test_score = result.iter().find(|f| f.path.ends_with("login.test.ts")).unwrap().score;
        assert!(impl_score > test_score);
    }

    #[test]
    fn eliminates_binary_and_lock_files() {
        let candidates = vec![
            candidate("package-lock.json", FileTag::Generated),
            candidate("assets/logo.png", FileTag::Other),
            candidate("src/auth/login.ts", FileTag::Code),
        ];
        let intent = intent(IntentCategory::Auth, &["login"]);
        let result = score_candidates(&candidates, &intent, &HashMap::new());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, "src/auth/login.ts");
    }

    #[test]
    fn session_boost_increases_score() {
        let candidates = vec![candidate("src/auth/session.ts", FileTag::Code)];
        let intent = intent(IntentCategory::Auth, &["auth"]);
        let mut boosts = HashMap::new();
        boosts.insert("src/auth/session.ts".to_string(), 50.0);
        let boosted = score_candidates(&candidates, &intent, &boosts);
        let baseline = score_candidates(&candidates, &intent, &HashMap::new());
        assert!(boosted[0].score > baseline[0].score);
    }

    #[test]
    fn deep_paths_are_penalized() {
        let shallow = candidate("src/a.ts", FileTag::Code);
        let deep = candidate("src/a/b/c/d/e/f/g/a.ts", FileTag::Code);
        let intent = intent(IntentCategory::General, &[]);
        let shallow_score = score_candidates(&[shallow], &intent, &HashMap::new())[0].score;
        let deep_score = score_candidates(&[deep], &intent, &HashMap::new())[0].score;
        assert!(deep_score < shallow_score);
    }

    #[test]
    fn implementation_extension_outranks_header() {
        let candidates = vec![
            candidate("content/renderer/bindings/core/v8/script_controller.cc", FileTag::Code),
            candidate("content/renderer/bindings/core/v8/script_controller.h", FileTag::Code),
        ];
        let intent = intent(IntentCategory::General, &["ScriptController"]);
        let result = score_candidates(&candidates, &intent, &HashMap::new());
        let cc = result.iter().find(|f| f.path.ends_with(".cc")).unwrap().score;
        let h = result.iter().find(|f| f.path.ends_with(".h")).unwrap().score;
        assert!(cc > h);
    }
}
