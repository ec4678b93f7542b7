//! File Classifier (§4.3) — a pure function from relative path to a [`FileTag`].
//!
//! Checked in order: generated, test, docs, config, code, other. Classifying
//! the same path twice always yields the same tag (invariant iv, §3).

use crate::types::FileTag;
use crate::util::{extension, filename, stem};

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "go", "java", "kt", "c", "h", "cc", "cpp",
    "cxx", "hpp", "hxx", "cs", "rb", "php", "swift", "scala", "sh", "bash", "zsh", "ps1", "sql",
    "vue", "svelte", "lua", "ex", "exs", "clj", "hs", "scss", "css", "html", "htm",
];

const GENERATED_DIRS: &[&str] = &[
    "dist/", "build/", "target/", "node_modules/", ".next/", "out/", "coverage/", ".nuxt/",
    "vendor/", "__pycache__/",
];

const TEST_DIRS: &[&str] =
    &["test/", "tests/", "spec/", "specs/", "e2e/", "__tests__/", "__mocks__/", "mocks/"];

fn path_has_segment_or_prefix(path: &str, needle: &str) -> bool {
    path.starts_with(needle) || path.contains(&format!("/{needle}"))
}

fn is_generated(path: &str, name: &str) -> bool {
    if GENERATED_DIRS.iter().any(|d| path_has_segment_or_prefix(path, d)) {
        return true;
    }
    let lock_names = [
        "package-lock.json",
        "yarn.lock",
        "pnpm-lock.yaml",
        "Cargo.lock",
        "poetry.lock",
        "Gemfile.lock",
        "composer.lock",
    ];
    if lock_names.contains(&name) {
        return true;
    }
    if name.ends_with(".log") || name.ends_with(".map") || name.ends_with(".d.ts") {
        return true;
    }
    if name.ends_with(".min.js") || name.ends_with(".min.css") {
        return true;
    }
    false
}

fn is_test(path: &str, stem: &str) -> bool {
    if TEST_DIRS.iter().any(|d| path_has_segment_or_prefix(path, d)) {
        return true;
    }
    let suffixes = [".test", ".spec", ".e2e", "_test", "_spec", ".stories"];
    suffixes.iter().any(|s| stem.ends_with(s))
}

fn is_docs(path: &str, name: &str, ext: &str) -> bool {
    let upper = name.to_uppercase();
    if upper.starts_with("README")
        || upper.starts_with("CHANGELOG")
        || upper.starts_with("LICENSE")
        || upper.starts_with("CONTRIBUTING")
    {
        return true;
    }
    if path_has_segment_or_prefix(path, "docs/") {
        return true;
    }
    matches!(ext, "md" | "mdx")
}

fn is_config(path: &str, name: &str, ext: &str) -> bool {
    let manifests = [
        "package.json",
        "Cargo.toml",
        "go.mod",
        "pyproject.toml",
        "setup.py",
        "composer.json",
        "Gemfile",
        "pom.xml",
        "build.gradle",
    ];
    if manifests.contains(&name) {
        return true;
    }
    if name.contains(".eslintrc")
        || name.contains(".prettierrc")
        || name.starts_with(".editorconfig")
        || name.contains(".config.")
    {
        return true;
    }
    if name.starts_with(".env") {
        return true;
    }
    if name == "Dockerfile" || name.starts_with("Dockerfile.") || name == "docker-compose.yml" {
        return true;
    }
    if matches!(ext, "yml" | "yaml" | "toml") {
        return true;
    }
    let _ = path;
    false
}

/// Classify a repository-relative path (§4.3). Pure function of `path`.
pub fn classify(path: &str) -> FileTag {
    let name = filename(path);
    let st = stem(path);
    let ext = extension(path);

    if is_generated(path, name) {
        FileTag::Generated
    } else if is_test(path, st) {
        FileTag::Test
    } else if is_docs(path, name, ext) {
        FileTag::Docs
    } else if is_config(path, name, ext) {
        FileTag::Config
    } else if CODE_EXTENSIONS.contains(&ext) {
        FileTag::Code
    } else {
        FileTag::Other
    }
}

/// Strip a test/spec/e2e/stories/.md suffix from a basename so canonical
/// duplicates can be paired (§4.3, §4.9): `x.test.ts` <-> `x.ts`.
pub fn canonical_basename(path: &str) -> String {
    let name = filename(path);
    let (base, ext) = match name.rsplit_once('.') {
        Some((b, e)) => (b, e),
        None => (name, ""),
    };
    let suffixes = [".test", ".spec", ".e2e", "_test", "_spec", ".stories"];
    let mut trimmed = base;
    for suf in suffixes {
        if let Some(s) = trimmed.strip_suffix(suf) {
            trimmed = s;
            break;
        }
    }
    if ext.is_empty() || ext == "md" {
        trimmed.to_string()
    } else {
        format!("{trimmed}.{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_generated() {
        assert_eq!(classify("package-lock.json"), FileTag::Generated);
        assert_eq!(classify("dist/bundle.js"), FileTag::Generated);
        assert_eq!(classify("src/types.d.ts"), FileTag::Generated);
        assert_eq!(classify("app.min.js"), FileTag::Generated);
    }

    #[test]
    fn classifies_test_before_docs_and_config() {
        assert_eq!(classify("src/auth/login.test.ts"), FileTag::Test);
        assert_eq!(classify("__tests__/login.ts"), FileTag::Test);
        assert_eq!(classify("e2e/login.spec.ts"), FileTag::Test);
    }

    #[test]
    fn classifies_docs() {
        assert_eq!(classify("README.md"), FileTag::Docs);
        assert_eq!(classify("docs/auth.md"), FileTag::Docs);
        assert_eq!(classify("CHANGELOG.md"), FileTag::Docs);
    }

    #[test]
    fn classifies_config() {
        assert_eq!(classify("package.json"), FileTag::Config);
        assert_eq!(classify("Cargo.toml"), FileTag::Config);
        assert_eq!(classify(".env.local"), FileTag::Config);
        assert_eq!(classify("Dockerfile"), FileTag::Config);
    }

    #[test]
    fn classifies_code_and_other() {
        assert_eq!(classify("src/auth/login.ts"), FileTag::Code);
        assert_eq!(classify("assets/logo.svg"), FileTag::Other);
    }

    #[test]
    fn classification_is_pure() {
        let p = "src/components/Button.test.tsx";
        assert_eq!(classify(p), classify(p));
    }

    #[test]
    fn canonical_basename_pairs_test_with_impl() {
        assert_eq!(canonical_basename("src/auth/login.test.ts"), "login.ts");
        assert_eq!(canonical_basename("src/auth/login.ts"), "login.ts");
    }
}
