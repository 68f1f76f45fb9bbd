use crate::error::{Error, Result};

/// First segment of every path that resolves through the mount table
pub const MOUNT_ROOT: &str = "mnt";

/// Where a mount-namespace path points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountPath<'a> {
    /// `/mnt` itself
    Namespace,
    /// `/mnt/<name>/<rest>`; `rest` is normalized and `/` for the mount root
    Mount { name: &'a str, rest: String },
}

/// Splits a path into its non-empty segments
#[must_use]
pub fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Canonical absolute form: repeated and trailing separators collapse, the
/// empty path is the root `/`
#[must_use]
pub fn normalize(path: &str) -> String {
    from_segments(&split(path))
}

fn from_segments(segments: &[&str]) -> String {
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

#[must_use]
pub fn join(parent: &str, name: &str) -> String {
    let mut segments = split(parent);
    segments.extend(split(name));
    from_segments(&segments)
}

#[must_use]
pub fn is_root(path: &str) -> bool {
    split(path).is_empty()
}

/// Extracts the final segment of a path, if there is one
#[must_use]
pub fn basename(path: &str) -> Option<&str> {
    split(path).last().copied()
}

/// Splits a path into its parent path and leaf name
pub fn parent_and_name(path: &str) -> Result<(String, String)> {
    let mut segments = split(path);
    let name = segments.pop().ok_or_else(|| Error::invalid_path(path))?;
    Ok((from_segments(&segments), name.to_string()))
}

/// Rejects `.` and `..` segments, which could walk out of a store root
pub fn validate(path: &str) -> Result<()> {
    if split(path).iter().any(|s| *s == "." || *s == "..") {
        return Err(Error::invalid_path(path));
    }
    Ok(())
}

/// True when `path` lies strictly beneath `ancestor`
#[must_use]
pub fn is_descendant(ancestor: &str, path: &str) -> bool {
    let ancestor = split(ancestor);
    let path = split(path);
    path.len() > ancestor.len() && path.starts_with(&ancestor)
}

#[must_use]
pub fn is_mount_path(path: &str) -> bool {
    split(path).first() == Some(&MOUNT_ROOT)
}

/// Splits a mount-namespace path into the mount name and the remainder
#[must_use]
pub fn split_mount(path: &str) -> Option<MountPath<'_>> {
    let segments = split(path);
    if segments.first() != Some(&MOUNT_ROOT) {
        return None;
    }
    match segments.get(1) {
        None => Some(MountPath::Namespace),
        Some(name) => Some(MountPath::Mount {
            name,
            rest: from_segments(&segments[2..]),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("//a///b/"), "/a/b");
        assert_eq!(normalize("a/b"), "/a/b");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a/", "/b/c"), "/a/b/c");
        assert_eq!(join("", ""), "/");
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(
            parent_and_name("/a/b/c.txt").unwrap(),
            ("/a/b".to_string(), "c.txt".to_string())
        );
        assert_eq!(
            parent_and_name("top/").unwrap(),
            ("/".to_string(), "top".to_string())
        );
        assert_eq!(parent_and_name("///"), Err(Error::invalid_path("///")));
        assert_eq!(parent_and_name(""), Err(Error::invalid_path("")));
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("/path/to/file.txt"), Some("file.txt"));
        assert_eq!(basename("/path/to/dir/"), Some("dir"));
        assert_eq!(basename("/"), None);
        assert_eq!(basename(""), None);
    }

    #[test]
    fn test_validate() {
        assert!(validate("/a/b").is_ok());
        assert!(validate("/a/../b").is_err());
        assert!(validate("./a").is_err());
        assert!(validate("/a/.hidden").is_ok());
    }

    #[test]
    fn test_is_descendant() {
        assert!(is_descendant("/a", "/a/b"));
        assert!(is_descendant("/", "/a"));
        assert!(!is_descendant("/a", "/a"));
        assert!(!is_descendant("/a", "/ab/c"));
        assert!(!is_descendant("/a/b", "/a"));
    }

    #[test]
    fn test_mount_paths() {
        assert!(is_mount_path("/mnt"));
        assert!(is_mount_path("mnt/drive1/x"));
        assert!(!is_mount_path("/mntx/y"));
        assert!(!is_mount_path("/user/mnt"));

        assert_eq!(split_mount("/mnt/"), Some(MountPath::Namespace));
        assert_eq!(
            split_mount("/mnt/drive1"),
            Some(MountPath::Mount {
                name: "drive1",
                rest: "/".to_string()
            })
        );
        assert_eq!(
            split_mount("//mnt//drive1/a//b.txt"),
            Some(MountPath::Mount {
                name: "drive1",
                rest: "/a/b.txt".to_string()
            })
        );
        assert_eq!(split_mount("/system"), None);
    }
}
