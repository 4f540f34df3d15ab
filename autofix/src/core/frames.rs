//! Stack-frame scanning over raw test output.
//!
//! Recognizes the `at <frame> (<path>:<line>:<col>)` convention emitted by
//! V8-based runtimes. Only frames whose path ends in a known source extension
//! are reported; everything else in the output is ignored.

use std::sync::LazyLock;

use regex::Regex;

static FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bat\s+[^\s(][^\n(]*?\s\(([^()\n]+?\.(?:js|jsx|mjs|cjs|ts|tsx)):(\d+):(\d+)\)")
        .expect("stack frame regex should compile")
});

/// A source location captured from one stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub path: &'a str,
    pub line: u32,
    pub column: u32,
    /// Byte offset of the frame in the scanned output.
    pub offset: usize,
}

/// Iterate stack frames in textual order of appearance.
pub fn scan_frames(output: &str) -> impl Iterator<Item = Frame<'_>> {
    FRAME_RE.captures_iter(output).filter_map(|caps| {
        let whole = caps.get(0)?;
        let path = caps.get(1)?.as_str();
        let line = caps.get(2)?.as_str().parse().ok()?;
        let column = caps.get(3)?.as_str().parse().ok()?;
        Some(Frame {
            path,
            line,
            column,
            offset: whole.start(),
        })
    })
}

/// True if `path` contains any of the exclusion markers (test, spec or dependency code).
pub fn has_exclusion_marker(path: &str, markers: &[String]) -> bool {
    markers
        .iter()
        .filter(|marker| !marker.is_empty())
        .any(|marker| path.contains(marker.as_str()))
}

/// Return the first `max_chars` characters of `text`, marking the cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(max_chars).collect();
    format!("{head}\n… (truncated)")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec![
            ".test.".to_string(),
            ".spec.".to_string(),
            "node_modules".to_string(),
        ]
    }

    #[test]
    fn scans_simple_frame() {
        let frames: Vec<_> = scan_frames("at run (/src/util.js:10:4)").collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].path, "/src/util.js");
        assert_eq!(frames[0].line, 10);
        assert_eq!(frames[0].column, 4);
    }

    #[test]
    fn scans_jest_style_frames_in_order() {
        let output = "\
  ● sum › adds numbers

    expect(received).toBe(expected)

      at Object.<anonymous> (src/math.test.js:5:17)
      at add (src/math.js:2:10)
      at Promise.then.completed (node_modules/jest-circus/build/utils.js:298:28)
";
        let paths: Vec<_> = scan_frames(output).map(|f| f.path).collect();
        assert_eq!(
            paths,
            vec![
                "src/math.test.js",
                "src/math.js",
                "node_modules/jest-circus/build/utils.js"
            ]
        );
    }

    #[test]
    fn ignores_unrecognized_extensions_and_anonymous_frames() {
        let output = "at main (src/lib.rs:1:1)\nat /src/app.js:3:4\nat load (src/app.py:2:2)";
        assert_eq!(scan_frames(output).count(), 0);
    }

    #[test]
    fn accepts_typescript_paths() {
        let frames: Vec<_> = scan_frames("    at handler (./api/routes.tsx:41:9)").collect();
        assert_eq!(frames[0].path, "./api/routes.tsx");
    }

    #[test]
    fn offsets_follow_text_order() {
        let output = "at a (x.js:1:1) then at b (y.ts:2:2)";
        let offsets: Vec<_> = scan_frames(output).map(|f| f.offset).collect();
        assert!(offsets[0] < offsets[1]);
    }

    #[test]
    fn exclusion_markers_match_substrings() {
        assert!(has_exclusion_marker("src/a.test.js", &markers()));
        assert!(has_exclusion_marker("lib/b.spec.ts", &markers()));
        assert!(has_exclusion_marker("node_modules/x/index.js", &markers()));
        assert!(!has_exclusion_marker("src/testing.js", &markers()));
    }

    #[test]
    fn empty_marker_never_matches() {
        assert!(!has_exclusion_marker("src/a.js", &[String::new()]));
    }

    #[test]
    fn excerpt_is_unicode_safe() {
        assert_eq!(excerpt("错误: 失败 😊", 5), "错误: 失\n… (truncated)");
        assert_eq!(excerpt("  short  ", 10), "short");
    }
}
