//! Runtime configuration — env-var overrides (§6) layered over defaults,
//! mirroring the way the teacher's `ScanConfig` centralises scan tuning
//! (`server/src/types.rs`).

use std::time::Duration;

pub const DEFAULT_MAX_FILES: usize = 300;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const TOOL_DIR: &str = ".mantic";

/// `MANTIC_MAX_FILES` / `MANTIC_TIMEOUT` / `MANTIC_IGNORE_PATTERNS` (§6).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_files: usize,
    pub timeout: Duration,
    pub extra_ignore_patterns: Vec<String>,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let max_files = std::env::var("MANTIC_MAX_FILES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v >= 1)
            .unwrap_or(DEFAULT_MAX_FILES);

        let timeout_ms = std::env::var("MANTIC_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let extra_ignore_patterns = std::env::var("MANTIC_IGNORE_PATTERNS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        Self { max_files, timeout: Duration::from_millis(timeout_ms), extra_ignore_patterns }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            extra_ignore_patterns: Vec::new(),
        }
    }
}

/// Current Unix-epoch seconds. Centralised so tests can observe call sites.
pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.max_files, DEFAULT_MAX_FILES);
        assert_eq!(cfg.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert!(cfg.extra_ignore_patterns.is_empty());
    }
}
