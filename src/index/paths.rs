//! Path normalization, validation and hierarchy predicates for the index.
//! Keep this module focused and small; collection logic belongs in mod.rs.
//!
//! A normalized path is absolute ('/'-prefixed), has no trailing separator
//! (except the root itself), no empty segments and no '.'/'..' segments. The
//! normalized form is the sole key for lookup, containment and ordering.

use crate::error::{AppError, AppResult};

/// The root path. It always refers to the top-level folder entry.
pub const ROOT: &str = "/";

/// Normalize a raw path into its canonical absolute form.
/// A single trailing '/' is stripped; everything else malformed is rejected.
pub fn normalize_path(input: &str) -> AppResult<String> {
    if input.is_empty() {
        return Err(AppError::invalid("empty_path", "path cannot be empty"));
    }
    if input.contains('\u{0000}') {
        return Err(AppError::invalid("nul_in_path", "path cannot contain NUL characters"));
    }
    if !input.starts_with('/') {
        return Err(AppError::invalid("relative_path", "path must be absolute (start with '/')"));
    }
    if input == ROOT {
        return Ok(ROOT.to_string());
    }
    let trimmed = input.strip_suffix('/').unwrap_or(input);
    if trimmed == ROOT || trimmed.is_empty() {
        return Ok(ROOT.to_string());
    }
    for seg in trimmed[1..].split('/') {
        if seg.is_empty() {
            return Err(AppError::invalid("empty_segment", "empty segments ('//') are not allowed"));
        }
        if seg == "." || seg == ".." {
            return Err(AppError::invalid("dot_segment", "segments '.' and '..' are not allowed"));
        }
    }
    Ok(trimmed.to_string())
}

/// Final segment of a normalized path. The root folder is named "root",
/// matching the seeded namespace.
pub fn name_of(path: &str) -> &str {
    if path == ROOT {
        return "root";
    }
    path.rsplit('/').next().unwrap_or(path)
}

/// Proper ancestors of a normalized path, excluding the root, shallowest
/// first: "/a/b/c" -> ["/a", "/a/b"].
pub fn ancestors_of(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    if path == ROOT {
        return out;
    }
    let bytes = path.as_bytes();
    for i in 1..bytes.len() {
        if bytes[i] == b'/' {
            out.push(path[..i].to_string());
        }
    }
    out
}

/// Prefix every member of `folder`'s subtree shares, with the separator
/// boundary included. For the root this is just "/".
pub fn child_prefix(folder: &str) -> String {
    if folder == ROOT { ROOT.to_string() } else { format!("{}/", folder) }
}

/// Exclusive upper bound for BTree range scans over a subtree: the smallest
/// string lexicographically greater than every path under `folder`. Relies on
/// '0' being the successor byte of '/'.
pub fn subtree_upper_bound(folder: &str) -> String {
    if folder == ROOT { "0".to_string() } else { format!("{}0", folder) }
}

/// True when `path` is `folder` itself or nested anywhere beneath it, with a
/// separator boundary so "/foo" never claims "/foobar".
pub fn is_within(path: &str, folder: &str) -> bool {
    path == folder || path.starts_with(&child_prefix(folder))
}

/// True when `path` is exactly one segment below `folder`. The folder itself
/// is never its own child.
pub fn is_direct_child(path: &str, folder: &str) -> bool {
    if path == folder {
        return false;
    }
    let prefix = child_prefix(folder);
    match path.strip_prefix(prefix.as_str()) {
        Some(rel) => !rel.is_empty() && !rel.contains('/'),
        None => false,
    }
}

/// Join an upload's declared filename onto a destination folder. Folder
/// uploads declare relative paths ("sub/dir/file.txt"), so interior
/// separators are allowed; the joined result must still normalize cleanly.
pub fn join_upload_path(folder: &str, declared_name: &str) -> AppResult<String> {
    if declared_name.is_empty() {
        return Err(AppError::invalid("empty_filename", "uploaded item has no filename"));
    }
    if declared_name.starts_with('/') {
        return Err(AppError::invalid("absolute_filename", "uploaded filename cannot be absolute"));
    }
    normalize_path(&format!("{}{}", child_prefix(folder), declared_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accepts_and_canonicalizes() {
        assert_eq!(normalize_path("/").unwrap(), "/");
        assert_eq!(normalize_path("/docs").unwrap(), "/docs");
        assert_eq!(normalize_path("/docs/").unwrap(), "/docs");
        assert_eq!(normalize_path("/docs/specs/RFC-1.md").unwrap(), "/docs/specs/RFC-1.md");
    }

    #[test]
    fn test_normalize_rejects_malformed() {
        assert!(normalize_path("").is_err());
        assert!(normalize_path("relative").is_err());
        assert!(normalize_path("/double//slash").is_err());
        assert!(normalize_path("/a/./b").is_err());
        assert!(normalize_path("/a/../b").is_err());
        let with_nul = format!("/a\u{0000}b");
        assert!(normalize_path(&with_nul).is_err());
    }

    #[test]
    fn test_name_and_ancestors() {
        assert_eq!(name_of("/"), "root");
        assert_eq!(name_of("/demo.txt"), "demo.txt");
        assert_eq!(name_of("/a/b/c"), "c");
        assert_eq!(ancestors_of("/a/b/c"), vec!["/a", "/a/b"]);
        assert!(ancestors_of("/a").is_empty());
        assert!(ancestors_of("/").is_empty());
    }

    #[test]
    fn test_containment_respects_separator_boundary() {
        assert!(is_within("/foo/bar", "/foo"));
        assert!(is_within("/foo", "/foo"));
        assert!(!is_within("/foobar", "/foo"));
        assert!(is_within("/anything", "/"));
    }

    #[test]
    fn test_direct_child() {
        assert!(is_direct_child("/demo.txt", "/"));
        assert!(is_direct_child("/docs/a.txt", "/docs"));
        assert!(!is_direct_child("/docs/sub/a.txt", "/docs"));
        assert!(!is_direct_child("/docs", "/docs"));
        assert!(!is_direct_child("/docsier/a.txt", "/docs"));
        assert!(!is_direct_child("/", "/"));
    }

    #[test]
    fn test_join_upload_path() {
        assert_eq!(join_upload_path("/up", "a.txt").unwrap(), "/up/a.txt");
        assert_eq!(join_upload_path("/", "a.txt").unwrap(), "/a.txt");
        assert_eq!(join_upload_path("/up", "sub/dir/b.png").unwrap(), "/up/sub/dir/b.png");
        assert!(join_upload_path("/up", "").is_err());
        assert!(join_upload_path("/up", "/abs.txt").is_err());
        assert!(join_upload_path("/up", "../escape.txt").is_err());
    }
}
