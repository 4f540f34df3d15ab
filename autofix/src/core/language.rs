//! Language hints for patch requests.

use std::path::Path;

/// Hint used when the extension is unknown.
pub const DEFAULT_LANGUAGE: &str = "javascript";

/// Map a file extension to the language name passed to the patch generator.
pub fn detect_language(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("js" | "jsx" | "mjs" | "cjs") => "javascript",
        Some("ts" | "tsx") => "typescript",
        Some("py") => "python",
        Some("go") => "go",
        Some("rs") => "rust",
        Some("java") => "java",
        _ => DEFAULT_LANGUAGE,
    }
}
