//! Home-relative path helpers.
//!
//! Two concerns share this module: expanding `~` before glob matching, and
//! shortening a cwd for display. Both take the home directory as a parameter
//! so callers (and tests) decide what "home" means.

use std::path::{Path, PathBuf};

/// Display paths longer than this are cut from the left.
pub const MAX_DISPLAY_CHARS: usize = 40;
const ELLIPSIS: char = '…';

pub fn home_dir_string() -> Option<String> {
    dirs::home_dir().map(|home| home.to_string_lossy().into_owned())
}

/// Expands a leading `~` or `~/` to `home`, then normalizes separators.
///
/// `~user` forms are left as-is. Without a home directory only normalization
/// is applied.
pub fn expand_home(path: &str, home: Option<&str>) -> String {
    let expanded = match home {
        Some(home) if path == "~" => home.to_string(),
        Some(home) => match path.strip_prefix("~/") {
            Some(rest) => format!("{}/{}", home.trim_end_matches('/'), rest),
            None => path.to_string(),
        },
        None => path.to_string(),
    };
    normalize_separators(&expanded)
}

/// Collapses duplicate slashes, interior `.` segments, and trailing slashes.
pub fn normalize_separators(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let normalized: PathBuf = Path::new(path).components().collect();
    normalized.to_string_lossy().into_owned()
}

/// Shortens a cwd for the presence `state` line.
///
/// A leading home prefix becomes `~`. If the result is longer than
/// [`MAX_DISPLAY_CHARS`] characters, only the last `MAX_DISPLAY_CHARS - 1`
/// are kept behind an ellipsis.
pub fn shorten_path(path: &str, home: Option<&str>) -> String {
    let substituted = replace_home_prefix(path, home);
    let len = substituted.chars().count();
    if len <= MAX_DISPLAY_CHARS {
        return substituted;
    }

    let keep = MAX_DISPLAY_CHARS - 1;
    let mut shortened = String::with_capacity(substituted.len());
    shortened.push(ELLIPSIS);
    shortened.extend(substituted.chars().skip(len - keep));
    shortened
}

/// Only replaces at a path boundary, so a sibling like `/home/user2` is left alone.
fn replace_home_prefix(path: &str, home: Option<&str>) -> String {
    let Some(home) = home.map(|h| h.trim_end_matches('/')).filter(|h| !h.is_empty()) else {
        return path.to_string();
    };

    match path.strip_prefix(home) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("~{}", rest),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: Option<&str> = Some("/home/u");

    #[test]
    fn shorten_replaces_home_prefix() {
        assert_eq!(shorten_path("/home/u/project", HOME), "~/project");
        assert_eq!(shorten_path("/home/u", HOME), "~");
    }

    #[test]
    fn shorten_ignores_sibling_with_shared_prefix() {
        assert_eq!(shorten_path("/home/user2/code", HOME), "/home/user2/code");
    }

    #[test]
    fn shorten_keeps_paths_at_limit() {
        let path = format!("/{}", "a".repeat(MAX_DISPLAY_CHARS - 1));
        assert_eq!(path.chars().count(), MAX_DISPLAY_CHARS);
        assert_eq!(shorten_path(&path, None), path);
    }

    #[test]
    fn shorten_truncates_long_paths_from_the_left() {
        let path = format!("/home/u/{}", "segment/".repeat(8));
        let shortened = shorten_path(&path, HOME);
        let substituted = format!("~/{}", "segment/".repeat(8));
        let tail: String = substituted
            .chars()
            .skip(substituted.chars().count() - 39)
            .collect();

        assert_eq!(shortened.chars().count(), MAX_DISPLAY_CHARS);
        assert_eq!(shortened, format!("…{}", tail));
    }

    #[test]
    fn shorten_counts_characters_not_bytes() {
        let path = format!("/{}", "é".repeat(MAX_DISPLAY_CHARS + 10));
        let shortened = shorten_path(&path, None);
        assert_eq!(shortened.chars().count(), MAX_DISPLAY_CHARS);
        assert!(shortened.starts_with('…'));
    }

    #[test]
    fn expand_home_handles_tilde_forms() {
        assert_eq!(expand_home("~", HOME), "/home/u");
        assert_eq!(expand_home("~/work/*", HOME), "/home/u/work/*");
        assert_eq!(expand_home("~other/work", HOME), "~other/work");
        assert_eq!(expand_home("~/work", None), "~/work");
    }

    #[test]
    fn expand_home_normalizes_separators() {
        assert_eq!(expand_home("~/work//proj/", HOME), "/home/u/work/proj");
        assert_eq!(expand_home("/a/./b", None), "/a/b");
        assert_eq!(expand_home("/", None), "/");
        assert_eq!(expand_home("", HOME), "");
    }
}
