use mantic_core::SearchResult;

pub fn render(result: &SearchResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|e| format!(r#"{{"error":"{e}"}}"#))
}
