//! Cleanup of free-form model responses into raw file content.

/// Strip a surrounding markdown code fence (with optional language tag) from a response.
///
/// Text without fences is returned trimmed. Only the outermost fence pair is
/// removed; fences inside the body are left alone.
pub fn strip_code_fences(text: &str) -> String {
    let mut clean = text.trim();
    if let Some(rest) = clean.strip_prefix("```") {
        // Drop the info string (`js`, `typescript`, ...) up to the first newline.
        clean = match rest.find('\n') {
            Some(idx) if is_info_string(&rest[..idx]) => &rest[idx + 1..],
            None if is_info_string(rest) => "",
            _ => rest,
        };
    }
    if let Some(rest) = clean.trim_end().strip_suffix("```") {
        clean = rest;
    }
    clean.trim().to_string()
}

fn is_info_string(s: &str) -> bool {
    s.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_' | '.'))
}
