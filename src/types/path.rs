use crate::types::Code;

pub const ROOT_PATH: &str = "/";

/// Absolute, `/`-separated, no empty segments, no trailing `/` except for the root itself.
pub fn validate_path(path: &str) -> Result<(), Code> {
    if path == ROOT_PATH {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') {
        return Err(Code::BadArguments);
    }
    for segment in path[1..].split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\0') {
            return Err(Code::BadArguments);
        }
    }

    Ok(())
}

/// Segments of a validated path. The root has none.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Splits a validated, non-root path into its parent path and its last segment.
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => (ROOT_PATH, &path[1..]),
        Some(i) => (&path[..i], &path[i + 1..]),
        None => (ROOT_PATH, path),
    }
}

pub fn join(parent: &str, name: &str) -> String {
    if parent == ROOT_PATH {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

pub fn is_same_or_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT_PATH || path == ancestor {
        return true;
    }
    path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        assert!(validate_path("/").is_ok());
        assert!(validate_path("/a/b").is_ok());
        assert_eq!(validate_path(""), Err(Code::BadArguments));
        assert_eq!(validate_path("a/b"), Err(Code::BadArguments));
        assert_eq!(validate_path("/a/"), Err(Code::BadArguments));
        assert_eq!(validate_path("/a//b"), Err(Code::BadArguments));
        assert_eq!(validate_path("/a/../b"), Err(Code::BadArguments));
    }

    #[test]
    fn split_and_join() {
        assert_eq!(split("/a"), ("/", "a"));
        assert_eq!(split("/a/b/c"), ("/a/b", "c"));
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
        assert_eq!(segments("/a/b").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(segments("/").count(), 0);
    }

    #[test]
    fn descendants() {
        assert!(is_same_or_descendant("/a/b", "/a"));
        assert!(is_same_or_descendant("/a", "/a"));
        assert!(!is_same_or_descendant("/ab", "/a"));
        assert!(is_same_or_descendant("/x", "/"));
    }
}
