use mantic_core::SearchResult;

pub fn render(result: &SearchResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Search: {}\n\n", result.query));
    out.push_str(&format!("_category: {} (confidence {:.2})_\n\n", result.intent.category.as_str(), result.intent.confidence));

    out.push_str("## Files\n\n");
    for file in &result.files {
        out.push_str(&format!("- `{}` — {:.1}", file.path, file.score));
        if !file.reasons.is_empty() {
            out.push_str(&format!(" ({})", file.reasons.join(", ")));
        }
        out.push('\n');
        if let Some(lines) = &file.matched_lines {
            for line in lines {
                out.push_str(&format!("  - L{}: `{}`\n", line.line, line.content));
            }
        }
    }

    if !result.warnings.is_empty() {
        out.push_str("\n## Warnings\n\n");
        for warning in &result.warnings {
            out.push_str(&format!("- **{}**: {}\n", warning.kind, warning.message));
        }
    }

    out
}
