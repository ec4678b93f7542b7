//! Intent Analyser (§4.2) — turns a free-text query into keywords, a category
//! guess, an optional sub-category, and a set of extracted entities used later
//! for hallucination detection (§4.9).

use crate::types::{ExtractedEntities, IntentAnalysis, IntentCategory};
use regex::Regex;
use std::sync::OnceLock;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "to", "for", "in", "of", "on", "at", "and",
    "or", "how", "do", "does", "can", "could", "please", "i", "want", "need", "find", "show",
    "me", "that", "this", "with", "it", "its", "be", "why", "what", "where", "when", "my",
    "fix", "add", "remove", "update", "create", "delete", "change", "make", "get", "set",
];

const TRIVIAL_SUFFIXES: &[&str] = &["ing", "ed", "es", "s"];

struct Category {
    name: IntentCategory,
    keywords: &'static [&'static str],
    sub_categories: &'static [(&'static str, &'static [&'static str])],
}

const CATEGORIES: &[Category] = &[
    Category {
        name: IntentCategory::Auth,
        keywords: &[
            "login", "logout", "auth", "authentication", "authorization", "session", "token",
            "password", "signin", "signup", "permission", "role", "jwt", "oauth", "credential",
        ],
        sub_categories: &[
            ("session-management", &["session", "token", "jwt"]),
            ("authorization", &["permission", "role", "authorization"]),
        ],
    },
    Category {
        name: IntentCategory::Ui,
        keywords: &[
            "button", "component", "page", "view", "screen", "modal", "dialog", "form", "render",
            "jsx", "tsx", "ui", "layout", "nav", "menu", "icon", "widget", "dropdown", "tooltip",
        ],
        sub_categories: &[
            ("forms", &["form", "input", "validation"]),
            ("navigation", &["nav", "menu", "route", "link"]),
        ],
    },
    Category {
        name: IntentCategory::Styling,
        keywords: &[
            "css", "style", "styling", "theme", "color", "responsive", "scss", "sass", "tailwind",
            "class", "animation", "transition", "spacing", "font",
        ],
        sub_categories: &[("theming", &["theme", "color", "dark"])],
    },
    Category {
        name: IntentCategory::Performance,
        keywords: &[
            "performance", "slow", "optimize", "optimization", "cache", "caching", "memory",
            "latency", "speed", "bottleneck", "profiling", "throughput",
        ],
        sub_categories: &[("caching", &["cache", "caching"])],
    },
    Category {
        name: IntentCategory::Backend,
        keywords: &[
            "api", "server", "database", "db", "query", "endpoint", "controller", "service",
            "route", "handler", "middleware", "migration", "schema", "repository",
        ],
        sub_categories: &[
            ("database", &["database", "db", "query", "migration", "schema"]),
            ("api", &["api", "endpoint", "route"]),
        ],
    },
    Category {
        name: IntentCategory::Testing,
        keywords: &[
            "test", "tests", "testing", "spec", "mock", "assert", "coverage", "e2e", "unit",
            "fixture", "snapshot",
        ],
        sub_categories: &[],
    },
    Category {
        name: IntentCategory::Config,
        keywords: &[
            "config", "configuration", "env", "environment", "setting", "settings", "yaml",
            "json", "toml", "docker", "ci", "pipeline", "deploy", "deployment",
        ],
        sub_categories: &[],
    },
];

fn is_kebab_or_pascal(token: &str) -> bool {
    token.contains('-') || token.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Split on whitespace/punctuation while keeping kebab-case and PascalCase
/// tokens intact (preserved verbatim as multi-part identifiers). Remaining
/// tokens are lowercased, stripped of a trailing trivial suffix
/// (`ing|ed|es|s`), checked against the stop list, and deduplicated
/// preserving first-seen order (§4.2).
pub fn tokenize(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in query.split(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?' | ':' | ';' | '"' | '\'' | '(' | ')')) {
        let raw = raw.trim_matches('-');
        if raw.is_empty() {
            continue;
        }
        let token = if is_kebab_or_pascal(raw) {
            raw.to_string()
        } else {
            let normalized = normalize_for_matching(raw);
            if STOP_WORDS.contains(&normalized.as_str()) {
                continue;
            }
            normalized
        };
        dedup_push(&mut tokens, token);
    }
    tokens
}

fn normalize_for_matching(token: &str) -> String {
    let lower = token.to_lowercase();
    for suf in TRIVIAL_SUFFIXES {
        if lower.len() > suf.len() + 2 {
            if let Some(stripped) = lower.strip_suffix(suf) {
                return stripped.to_string();
            }
        }
    }
    lower
}

fn count_matches(keywords: &[String], category: &Category) -> usize {
    keywords
        .iter()
        .filter(|k| {
            let norm = normalize_for_matching(k);
            category.keywords.iter().any(|c| *c == norm || norm.contains(c))
        })
        .count()
}

/// Longest matched token's character length, used to break ties between
/// categories with equal match counts (§4.2).
fn longest_match_len(keywords: &[String], category: &Category) -> usize {
    keywords
        .iter()
        .filter(|k| {
            let norm = normalize_for_matching(k);
            category.keywords.iter().any(|c| *c == norm || norm.contains(c))
        })
        .map(|k| k.chars().count())
        .max()
        .unwrap_or(0)
}

fn confidence_for_count(count: usize) -> f64 {
    match count {
        0 => 0.0,
        1 => 0.75,
        2 => 0.85,
        _ => 0.95,
    }
}

fn classify_category(keywords: &[String]) -> (IntentCategory, f64, Option<String>) {
    let mut scored: Vec<(IntentCategory, usize, usize, Option<String>)> = CATEGORIES
        .iter()
        .map(|cat| {
            let count = count_matches(keywords, cat);
            let longest = longest_match_len(keywords, cat);
            let sub = cat
                .sub_categories
                .iter()
                .find(|(_, subs)| keywords.iter().any(|k| subs.contains(&normalize_for_matching(k).as_str())))
                .map(|(name, _)| name.to_string());
            (cat.name, count, longest, sub)
        })
        .collect();
    // Primary: match count descending. Tie-break: longest matched token wins (§4.2).
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)));

    let (top_cat, top_count, _, top_sub) = scored[0].clone();
    if top_count == 0 {
        return (IntentCategory::General, 0.0, None);
    }

    let other_matching = scored.iter().skip(1).filter(|s| s.1 > 0).count();
    let mut confidence = confidence_for_count(top_count);
    if other_matching == 1 {
        confidence *= 0.85;
    } else if other_matching >= 2 {
        confidence *= 0.70;
    }
    confidence = confidence.clamp(0.0, 1.0);

    (top_cat, confidence, top_sub)
}

fn file_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b[\w\-/]+\.(ts|tsx|js|jsx|mjs|py|rs|go|java|rb|php|vue|svelte|md|json|ya?ml|toml|css|scss)\b").unwrap()
    })
}

fn function_call_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([a-zA-Z_][a-zA-Z0-9_]*)\(\)").unwrap())
}

fn pascal_word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-zA-Z0-9]*\b").unwrap())
}

fn error_word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Za-z][A-Za-z0-9]*(Error|Exception)\b").unwrap())
}

const COMPONENT_SUFFIXES: &[&str] =
    &["Component", "Page", "View", "Modal", "Form", "Button", "Card", "List", "Panel", "Dialog"];

fn dedup_push(vec: &mut Vec<String>, value: String) {
    if !vec.contains(&value) {
        vec.push(value);
    }
}

fn extract_entities(query: &str) -> ExtractedEntities {
    let mut entities = ExtractedEntities::default();

    for m in file_pattern().find_iter(query) {
        dedup_push(&mut entities.files, m.as_str().to_string());
    }
    for cap in function_call_pattern().captures_iter(query) {
        dedup_push(&mut entities.functions, cap[1].to_string());
    }
    for m in error_word_pattern().find_iter(query) {
        dedup_push(&mut entities.errors, m.as_str().to_string());
    }
    for m in pascal_word_pattern().find_iter(query) {
        let word = m.as_str();
        if entities.errors.iter().any(|e| e == word) {
            continue;
        }
        if COMPONENT_SUFFIXES.iter().any(|s| word.ends_with(s)) {
            dedup_push(&mut entities.components, word.to_string());
        } else {
            dedup_push(&mut entities.classes, word.to_string());
        }
    }

    entities
}

/// Analyse a free-text query (§4.2). Deterministic given the same input.
pub fn analyze(query: &str) -> IntentAnalysis {
    let keywords = tokenize(query);
    let (category, confidence, sub_category) = classify_category(&keywords);
    let entities = extract_entities(query);

    IntentAnalysis { category, keywords, confidence, sub_category, entities }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_auth_query() {
        let analysis = analyze("fix the login session token bug");
        assert_eq!(analysis.category, IntentCategory::Auth);
        assert!(analysis.confidence >= 0.75);
    }

    #[test]
    fn falls_back_to_general_without_signal() {
        let analysis = analyze("the quick brown thing");
        assert_eq!(analysis.category, IntentCategory::General);
        assert_eq!(analysis.confidence, 0.0);
    }

    #[test]
    fn preserves_kebab_and_pascal_tokens() {
        let keywords = tokenize("update UserProfile in user-settings page");
        assert!(keywords.contains(&"UserProfile".to_string()));
        assert!(keywords.contains(&"user-settings".to_string()));
    }

    #[test]
    fn extracts_entities() {
        let analysis = analyze("LoginForm calls validateUser() and throws AuthError, see login.test.ts");
        assert!(analysis.entities.components.contains(&"LoginForm".to_string()));
        assert!(analysis.entities.functions.contains(&"validateUser".to_string()));
        assert!(analysis.entities.errors.contains(&"AuthError".to_string()));
        assert!(analysis.entities.files.contains(&"login.test.ts".to_string()));
    }

    #[test]
    fn competing_categories_reduce_confidence() {
        let clean = analyze("login session token");
        let mixed = analyze("login session token css theme color");
        assert!(mixed.confidence <= clean.confidence);
    }
}
