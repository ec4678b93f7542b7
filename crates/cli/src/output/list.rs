use mantic_core::SearchResult;

pub fn render(result: &SearchResult, quiet: bool) -> String {
    let mut out = String::new();
    for file in &result.files {
        if quiet {
            out.push_str(&file.path);
            out.push('\n');
        } else {
            out.push_str(&format!("{:<60} {:>7.1}  {}\n", file.path, file.score, file.reasons.join(",")));
        }
    }
    if !quiet {
        out.push_str(&format!("\n{} files ({} scanned)\n", result.files.len(), result.metadata.total_scanned));
    }
    out
}
