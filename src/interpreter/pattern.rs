//! Shell Pattern Matching
//!
//! `case` arms and filename generation share one pattern syntax: `*`, `?` and
//! `[...]` classes. Quoted fragments are escaped before they get here, so a
//! pattern string is always ready for `glob::Pattern`.

use glob::{MatchOptions, Pattern};

/// Options for `case` matching: `*` also crosses `/` and leading dots.
const CASE_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Options for filename generation: hidden files need an explicit `.`.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Escape text so it matches only itself.
pub fn escape(text: &str) -> String {
    Pattern::escape(text)
}

/// Check if text contains unescaped glob metacharacters.
pub fn has_glob_chars(text: &str) -> bool {
    text.contains(['*', '?', '['])
}

/// Match `text` against a shell pattern. A malformed pattern (e.g. an
/// unterminated `[`) matches only its own literal text.
pub fn pattern_matches(pattern: &str, text: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(p) => p.matches_with(text, CASE_OPTIONS),
        Err(_) => pattern == text,
    }
}

/// Expand a filename pattern relative to `cwd`. Results are sorted; relative
/// patterns yield relative paths. Returns an empty list when nothing matches.
pub fn glob_in_dir(pattern: &str, cwd: &str) -> Vec<String> {
    let (full, prefix) = if pattern.starts_with('/') {
        (pattern.to_string(), None)
    } else {
        let base = cwd.trim_end_matches('/');
        (format!("{}/{}", escape(base), pattern), Some(format!("{}/", base)))
    };

    let paths = match glob::glob_with(&full, GLOB_OPTIONS) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::debug!(pattern, error = %e, "invalid glob pattern");
            return Vec::new();
        }
    };

    let mut matches: Vec<String> = paths
        .filter_map(Result::ok)
        .map(|path| {
            let path = path.to_string_lossy().into_owned();
            match &prefix {
                Some(prefix) => path.strip_prefix(prefix.as_str()).map(str::to_string).unwrap_or(path),
                None => path,
            }
        })
        .collect();
    matches.sort();
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("*", "anything/at all"));
        assert!(pattern_matches("a?c", "abc"));
        assert!(pattern_matches("[ab]*", "banana"));
        assert!(!pattern_matches("a", "ab"));
        assert!(pattern_matches("*.txt", ".hidden.txt"));
    }

    #[test]
    fn test_escaped_pattern_is_literal() {
        let pattern = escape("a*b");
        assert!(pattern_matches(&pattern, "a*b"));
        assert!(!pattern_matches(&pattern, "axxb"));
    }

    #[test]
    fn test_malformed_pattern_matches_itself() {
        assert!(pattern_matches("[abc", "[abc"));
        assert!(!pattern_matches("[abc", "a"));
    }

    #[test]
    fn test_glob_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.txt", "c.log", ".d.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let cwd = dir.path().to_string_lossy().into_owned();

        assert_eq!(glob_in_dir("*.txt", &cwd), vec!["a.txt", "b.txt"]);
        assert!(glob_in_dir("*.none", &cwd).is_empty());

        let absolute = format!("{}/*.log", escape(&cwd));
        assert_eq!(glob_in_dir(&absolute, "/"), vec![format!("{}/c.log", cwd)]);
    }
}
