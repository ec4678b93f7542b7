//! Context Builder (§4.9) — assembles the final [`SearchResult`]: canonical
//! duplicate detection, entity validation against what was actually found
//! (hallucination detection), and per-file confidence scoring.

use crate::classify::canonical_basename;
use crate::types::{
    ExtractedEntities, FileMetadata, FileTag, IntentAnalysis, ScoredFile, SearchMetadata, SearchResult,
    ValidationResult, Warning,
};
use crate::util::levenshtein_similarity;
use std::collections::{HashMap, HashSet};

const SUGGESTION_SIMILARITY_THRESHOLD: f64 = 0.7;
const HALLUCINATION_RATIO_THRESHOLD: f64 = 0.5;

/// Group the result set by canonical basename and flag test/docs duplicates
/// of a canonical implementation file (§4.3, §4.9).
pub fn duplicate_warnings(files: &[ScoredFile]) -> Vec<Warning> {
    let mut groups: HashMap<String, Vec<&ScoredFile>> = HashMap::new();
    for file in files {
        groups.entry(canonical_basename(&file.path)).or_default().push(file);
    }

    let mut warnings = Vec::new();
    for (_, members) in groups {
        if members.len() < 2 {
            continue;
        }
        let canonical = members.iter().find(|f| crate::classify::classify(&f.path).is_canonical());
        let Some(canonical) = canonical else { continue };

        let tests: Vec<&str> = members
            .iter()
            .filter(|f| crate::classify::classify(&f.path) == FileTag::Test)
            .map(|f| f.path.as_str())
            .collect();
        let docs: Vec<&str> = members
            .iter()
            .filter(|f| crate::classify::classify(&f.path) == FileTag::Docs)
            .map(|f| f.path.as_str())
            .collect();

        if !tests.is_empty() {
            warnings.push(Warning {
                kind: "duplicate_test".to_string(),
                message: format!("{} looks like a test counterpart of {}", tests.join(", "), canonical.path),
                suggestions: vec![canonical.path.clone()],
            });
        }
        if !docs.is_empty() {
            warnings.push(Warning {
                kind: "duplicate_docs".to_string(),
                message: format!("{} documents {}", docs.join(", "), canonical.path),
                suggestions: vec![canonical.path.clone()],
            });
        }
        if !tests.is_empty() || !docs.is_empty() {
            warnings.push(Warning {
                kind: "prefer_canonical".to_string(),
                message: format!("prefer {} as the canonical match", canonical.path),
                suggestions: vec![canonical.path.clone()],
            });
        }
    }
    warnings
}

fn closest_match<'a>(name: &str, candidates: &'a HashSet<String>) -> Option<(&'a String, f64)> {
    candidates
        .iter()
        .map(|c| (c, levenshtein_similarity(name, c)))
        .filter(|(_, sim)| *sim >= SUGGESTION_SIMILARITY_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

fn validate_group(names: &[String], known: &HashSet<String>, kind_not_found: Option<&str>) -> (usize, Vec<Warning>) {
    let mut found = 0;
    let mut warnings = Vec::new();
    for name in names {
        if known.contains(name) {
            found += 1;
            continue;
        }
        match closest_match(name, known) {
            Some((suggestion, _)) => {
                warnings.push(Warning {
                    kind: "entity_suggestion".to_string(),
                    message: format!("'{name}' wasn't found; did you mean '{suggestion}'?"),
                    suggestions: vec![suggestion.clone()],
                });
            }
            None => {
                if let Some(kind) = kind_not_found {
                    warnings.push(Warning {
                        kind: kind.to_string(),
                        message: format!("'{name}' wasn't found in this codebase"),
                        suggestions: Vec::new(),
                    });
                }
            }
        }
    }
    (found, warnings)
}

/// Validate entities extracted from the query against what the search
/// actually surfaced. A query naming mostly-nonexistent entities is flagged
/// as a likely hallucination (§4.9).
pub fn validate_entities(
    entities: &ExtractedEntities,
    known_paths: &HashSet<String>,
    indexed_symbols: &HashSet<String>,
) -> (ValidationResult, Vec<Warning>) {
    let total = entities.total();
    if total == 0 {
        return (ValidationResult { is_valid: true, entity_count: 0, found_count: 0 }, Vec::new());
    }

    let mut found = 0;
    let mut warnings = Vec::new();

    let (f, w) = validate_group(&entities.files, known_paths, None);
    found += f;
    warnings.extend(w);

    let (f, w) = validate_group(&entities.functions, indexed_symbols, None);
    found += f;
    warnings.extend(w);

    let (f, w) = validate_group(&entities.classes, indexed_symbols, None);
    found += f;
    warnings.extend(w);

    let (f, w) = validate_group(&entities.components, indexed_symbols, Some("component_not_found"));
    found += f;
    warnings.extend(w);

    let (f, w) = validate_group(&entities.errors, indexed_symbols, None);
    found += f;
    warnings.extend(w);

    let ratio = found as f64 / total as f64;
    if ratio < HALLUCINATION_RATIO_THRESHOLD {
        warnings.push(Warning {
            kind: "likely_hallucination".to_string(),
            message: format!("only {found}/{total} referenced entities were found in this codebase"),
            suggestions: Vec::new(),
        });
    }

    (ValidationResult { is_valid: ratio >= HALLUCINATION_RATIO_THRESHOLD, entity_count: total, found_count: found }, warnings)
}

/// `clamp(0,1, (score/median*0.6 + score/mean*0.4) / 2)` per file (§4.9).
pub fn assign_confidence(files: &mut [ScoredFile]) {
    if files.is_empty() {
        return;
    }
    let mut scores: Vec<f64> = files.iter().map(|f| f.score).collect();
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = scores[scores.len() / 2].max(0.0001);
    let mean = (scores.iter().sum::<f64>() / scores.len() as f64).max(0.0001);

    for file in files.iter_mut() {
        let confidence = crate::util::clamp01((file.score / median * 0.6 + file.score / mean * 0.4) / 2.0);
        match &mut file.metadata {
            Some(meta) => meta.confidence = confidence,
            None => {
                file.metadata = Some(FileMetadata { confidence, ..Default::default() });
            }
        }
    }
}

/// Assemble the final result for one pipeline invocation (§4.9).
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    query: String,
    intent: IntentAnalysis,
    mut files: Vec<ScoredFile>,
    metadata: SearchMetadata,
    git_state: Option<Vec<String>>,
    known_paths: &HashSet<String>,
    indexed_symbols: &HashSet<String>,
) -> SearchResult {
    assign_confidence(&mut files);

    let mut warnings = duplicate_warnings(&files);
    let (validation, entity_warnings) = validate_entities(&intent.entities, known_paths, indexed_symbols);
    warnings.extend(entity_warnings);

    SearchResult { query, intent, files, metadata, git_state, warnings, validation: Some(validation) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtractedEntities;

    #[test]
    fn flags_test_and_docs_duplicates() {
        let files = vec![
            ScoredFile::new("src/auth/login.ts", 90.0),
            ScoredFile::new("src/auth/login.test.ts", 40.0),
            ScoredFile::new("docs/login.md", 20.0),
        ];
        let warnings = duplicate_warnings(&files);
        assert!(warnings.iter().any(|w| w.kind == "duplicate_test"));
        assert!(warnings.iter().any(|w| w.kind == "duplicate_docs"));
        assert!(warnings.iter().any(|w| w.kind == "prefer_canonical"));
    }

    #[test]
    fn hallucination_flagged_when_entities_mostly_missing() {
        let mut entities = ExtractedEntities::default();
        entities.components.push("GhostWidget".to_string());
        entities.functions.push("nonExistentFn".to_string());
        let known_paths = HashSet::new();
        let known_symbols = HashSet::new();
        let (validation, warnings) = validate_entities(&entities, &known_paths, &known_symbols);
        assert!(!validation.is_valid);
        assert!(warnings.iter().any(|w| w.kind == "likely_hallucination"));
        assert!(warnings.iter().any(|w| w.kind == "component_not_found"));
    }

    #[test]
    fn suggests_close_match_for_typo() {
        let mut entities = ExtractedEntities::default();
        entities.components.push("LoginFrm".to_string());
        let known_paths = HashSet::new();
        let mut known_symbols = HashSet::new();
        known_symbols.insert("LoginForm".to_string());
        let (_, warnings) = validate_entities(&entities, &known_paths, &known_symbols);
        assert!(warnings.iter().any(|w| w.kind == "entity_suggestion" && w.suggestions.contains(&"LoginForm".to_string())));
    }

    #[test]
    fn confidence_is_clamped_and_relative() {
        let mut files = vec![ScoredFile::new("a.ts", 100.0), ScoredFile::new("b.ts", 10.0)];
        assign_confidence(&mut files);
        let a_conf = files[0].metadata.as_ref().unwrap().confidence;
        let b_conf = files[1].metadata.as_ref().unwrap().confidence;
        assert!((0.0..=1.0).contains(&a_conf));
        assert!(a_conf > b_conf);
    }
}
