//! Lexical path helpers shared by the archive validator, the extractor and managed files.
//!
//! Nothing here touches the filesystem except `absolute`, which only reads the
//! current directory.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Normalize a slash-separated archive name: drop empty and `.` segments and fold `..`
/// into the previous segment. Leading `..` segments that cannot be folded are kept, and
/// a leading `/` is preserved.
pub fn clean_archive_name(name: &str) -> String {
    let rooted = name.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// True for names that denote an absolute location on any common platform.
pub fn is_absolute_name(name: &str) -> bool {
    if name.starts_with('/') || name.starts_with('\\') {
        return true;
    }
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Last slash-separated segment of an archive name.
pub fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Lower-cased extension of an archive name, without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    let base = base_name(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() {
        // dotfile such as ".png"
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Lexically normalize a filesystem path without resolving symlinks.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute, lexically normalized form of `path`.
pub fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

/// Whether `candidate` resolves to a location inside `root` (or `root` itself).
pub fn is_within(root: &Path, candidate: &Path) -> io::Result<bool> {
    let root = absolute(root)?;
    let candidate = absolute(candidate)?;
    Ok(candidate.starts_with(&root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_archive_names() {
        assert_eq!(clean_archive_name("uploads/./logos//a.png"), "uploads/logos/a.png");
        assert_eq!(clean_archive_name("uploads/files/../../etc/passwd"), "etc/passwd");
        assert_eq!(clean_archive_name("../x"), "../x");
        assert_eq!(clean_archive_name("/etc/passwd"), "/etc/passwd");
        assert_eq!(clean_archive_name(""), ".");
    }

    #[test]
    fn detects_absolute_names() {
        assert!(is_absolute_name("/etc/passwd"));
        assert!(is_absolute_name("C:\\Windows"));
        assert!(is_absolute_name("\\\\server\\share"));
        assert!(!is_absolute_name("uploads/logos/a.png"));
    }

    #[test]
    fn extracts_extensions() {
        assert_eq!(extension_of("uploads/logos/A.PNG").as_deref(), Some("png"));
        assert_eq!(extension_of("uploads/files/archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("uploads/files/README"), None);
        assert_eq!(extension_of("uploads/files/.png"), None);
    }

    #[test]
    fn containment_is_lexical() {
        let root = Path::new("/srv/uploads");
        assert!(is_within(root, Path::new("/srv/uploads/logos/a.png")).unwrap());
        assert!(!is_within(root, Path::new("/srv/uploads/../secrets")).unwrap());
        assert!(!is_within(root, Path::new("/srv/uploads-old/a.png")).unwrap());
    }
}
