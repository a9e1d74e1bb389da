//! Path normalization for ComicRack <-> YACReader matching.
//!
//! CRITICAL: Matching compares normalized strings on both sides. Any change
//! here changes which database rows find a ComicRack book. Run tests after changes.

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Drop every character outside printable 7-bit ASCII.
/// Non-ASCII characters are removed, not transliterated: "Café" → "Caf".
pub fn strip_non_printable(s: &str) -> String {
    s.chars().filter(|c| matches!(c, ' '..='~')).collect()
}

/// Lexically collapse a '/'-separated path.
/// Removes empty and "." segments and resolves ".." against the previous
/// segment. Never climbs above a root ("/") or a drive ("c:").
fn collapse_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for seg in path.split('/') {
        match seg {
            "" | "." => continue,
            ".." => match parts.last() {
                Some(&"..") => parts.push(".."),
                Some(last) if parts.len() == 1 && last.ends_with(':') => {}
                Some(_) => {
                    parts.pop();
                }
                None if absolute => {}
                None => parts.push(".."),
            },
            _ => parts.push(seg),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() && !path.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize a file path for comparison.
/// Case-folds, unifies separators to '/', collapses redundant segments and
/// strips non-ASCII. Idempotent; empty input stays empty.
/// e.g., "C:\\Comics\\.\\Batman 001.cbz" → "c:/comics/batman 001.cbz"
pub fn normalize_path(path: &str) -> String {
    let ascii = strip_non_printable(path);
    let unified = ascii.replace('\\', "/").to_ascii_lowercase();
    collapse_segments(&unified)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_basic() {
        assert_eq!(normalize_path("C:/Comics/Batman 001.cbz"), "c:/comics/batman 001.cbz");
        assert_eq!(normalize_path("C:\\Comics\\Batman 001.cbz"), "c:/comics/batman 001.cbz");
        assert_eq!(normalize_path("/Batman/001.cbz"), "/batman/001.cbz");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn test_normalize_path_collapses_segments() {
        assert_eq!(normalize_path("C:/Comics//DC/./Batman.cbz"), "c:/comics/dc/batman.cbz");
        assert_eq!(normalize_path("C:/Comics/Marvel/../DC/Batman.cbz"), "c:/comics/dc/batman.cbz");
        assert_eq!(normalize_path("/comics/"), "/comics");
        assert_eq!(normalize_path("/../comics"), "/comics");
        assert_eq!(normalize_path("c:/../comics"), "c:/comics");
        assert_eq!(normalize_path("../../comics"), "../../comics");
        assert_eq!(normalize_path("./"), ".");
    }

    #[test]
    fn test_strip_non_printable() {
        assert_eq!(normalize_path("/Comics/Astérix.cbz"), "/comics/astrix.cbz");
        assert_eq!(strip_non_printable("tab\there"), "tabhere");
        assert_eq!(strip_non_printable("\u{FEFF}Saga"), "Saga");
    }

    #[test]
    fn test_normalize_path_idempotent() {
        let samples = [
            "",
            ".",
            "./",
            "..",
            "C:\\Comics\\Batman 001.cbz",
            "/Comics/é/Batman.cbz",
            "a/é/../b",
            "//server//share/../x/",
            "c:/..",
            "../a/../../b",
            "Comics\\\\Saga (2012)\\Saga 001.CBR",
            "\u{00A0}/ /x",
        ];
        for p in samples {
            let once = normalize_path(p);
            assert_eq!(normalize_path(&once), once, "not idempotent for {:?}", p);
        }
    }
}
