//! # Pointer-Style Paths
//!
//! Node paths use JSON-Pointer syntax (RFC 6901): segments separated by
//! `/`, with `~0` standing for a literal `~` and `~1` for a literal `/`.
//! Three navigation tokens extend the syntax for relative lookups:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `#`   | jump to the tree root |
//! | `..`  | jump to the parent node |
//! | `.`   | stay on the current node |
//!
//! This module is the string layer only. Walking a tree with the parsed
//! segments lives next to the tree itself, which owns the node links.

use std::borrow::Cow;

/// Segment separator.
pub const SEPARATOR: char = '/';

/// Escape marker introducing `~0` / `~1`.
pub const ESCAPE: char = '~';

/// Navigation token: jump to the root node.
pub const ROOT_TOKEN: &str = "#";

/// Navigation token: jump to the parent node.
pub const PARENT_TOKEN: &str = "..";

/// Navigation token: no-op.
pub const CURRENT_TOKEN: &str = ".";

/// Classification of a single raw path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathToken<'a> {
    /// `#`
    Root,
    /// `..`
    Parent,
    /// `.`
    Current,
    /// Any other segment, still escaped.
    Key(&'a str),
}

impl<'a> PathToken<'a> {
    /// Classify a raw (escaped) segment.
    pub fn classify(segment: &'a str) -> Self {
        match segment {
            ROOT_TOKEN => Self::Root,
            PARENT_TOKEN => Self::Parent,
            CURRENT_TOKEN => Self::Current,
            other => Self::Key(other),
        }
    }
}

/// Split a path into its raw segments.
///
/// Empty segments are dropped, so leading, trailing, and doubled
/// separators are harmless: `"/a//b/"` yields `["a", "b"]`. Segments are
/// returned still escaped; use [`unescape`] on key segments before
/// comparing them with property names.
///
/// Returns `None` when the path has no segments at all (it addresses the
/// starting node itself).
pub fn segments(path: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = path
        .split(SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

/// Reverse pointer escaping: `~1` becomes `/`, then `~0` becomes `~`.
pub fn unescape(segment: &str) -> Cow<'_, str> {
    if !segment.contains(ESCAPE) {
        return Cow::Borrowed(segment);
    }
    Cow::Owned(segment.replace("~1", "/").replace("~0", "~"))
}

/// Escape a property key for use as a path segment.
pub fn escape(key: &str) -> Cow<'_, str> {
    if !key.contains(ESCAPE) && !key.contains(SEPARATOR) {
        return Cow::Borrowed(key);
    }
    Cow::Owned(key.replace('~', "~0").replace('/', "~1"))
}

/// Append an (unescaped) property key to a parent path.
///
/// The root path is the empty string, so `join("", "a")` is `"/a"`.
pub fn join(parent: &str, key: &str) -> String {
    let mut path = String::with_capacity(parent.len() + key.len() + 1);
    path.push_str(parent);
    path.push(SEPARATOR);
    path.push_str(&escape(key));
    path
}

/// Convert a validator instance path into pointer form.
///
/// Pointer paths pass through untouched. Dotted/bracketed paths such as
/// `.a[0]['b/c']` are rewritten to `/a/0/b~1c`.
pub fn normalize_instance_path(path: &str) -> String {
    if path.is_empty() || path.starts_with(SEPARATOR) {
        return path.to_string();
    }
    let mut out = String::new();
    let mut chars = path.chars().peekable();
    let mut current = String::new();
    let flush = |out: &mut String, current: &mut String| {
        if !current.is_empty() {
            out.push(SEPARATOR);
            out.push_str(&escape(current));
            current.clear();
        }
    };
    while let Some(c) = chars.next() {
        match c {
            '.' => flush(&mut out, &mut current),
            '[' => {
                flush(&mut out, &mut current);
                let quote = match chars.peek() {
                    Some(&q @ ('\'' | '"')) => {
                        chars.next();
                        Some(q)
                    }
                    _ => None,
                };
                for inner in chars.by_ref() {
                    if Some(inner) == quote {
                        continue;
                    }
                    if inner == ']' {
                        break;
                    }
                    current.push(inner);
                }
                flush(&mut out, &mut current);
            }
            other => current.push(other),
        }
    }
    flush(&mut out, &mut current);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_drop_empty() {
        assert_eq!(
            segments("/a//b/"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(segments("a/b"), Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_segments_empty_path_is_none() {
        assert_eq!(segments(""), None);
        assert_eq!(segments("///"), None);
    }

    #[test]
    fn test_segments_do_not_unescape() {
        assert_eq!(segments("/a~1b"), Some(vec!["a~1b".to_string()]));
    }

    #[test]
    fn test_unescape_order() {
        assert_eq!(unescape("a~1b"), "a/b");
        assert_eq!(unescape("a~0b"), "a~b");
        // `~01` is an escaped `~` followed by `1`, not a slash.
        assert_eq!(unescape("~01"), "~1");
    }

    #[test]
    fn test_escape_special_keys() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a/b"), "a~1b");
        assert_eq!(escape("~x"), "~0x");
    }

    #[test]
    fn test_join_from_root() {
        assert_eq!(join("", "a"), "/a");
        assert_eq!(join("/a", "b/c"), "/a/b~1c");
    }

    #[test]
    fn test_classify_tokens() {
        assert_eq!(PathToken::classify("#"), PathToken::Root);
        assert_eq!(PathToken::classify(".."), PathToken::Parent);
        assert_eq!(PathToken::classify("."), PathToken::Current);
        assert_eq!(PathToken::classify("name"), PathToken::Key("name"));
    }

    #[test]
    fn test_normalize_dotted_instance_path() {
        assert_eq!(normalize_instance_path(".a[0].b"), "/a/0/b");
        assert_eq!(normalize_instance_path(".a['x/y']"), "/a/x~1y");
        assert_eq!(normalize_instance_path("/already/pointer"), "/already/pointer");
        assert_eq!(normalize_instance_path(""), "");
    }
}
