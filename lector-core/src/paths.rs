use std::io;
use std::path::{Component, Path, PathBuf};

/// Turns a user supplied path into an absolute one.
///
/// Absolute paths are returned untouched. Relative paths are taken relative
/// to the current working directory, then resolved: symlinks are followed
/// when the path exists, otherwise `.` and `..` are collapsed lexically.
pub fn resolve_input_path(user_path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let path = user_path.as_ref();
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    Ok(resolve_from(&std::env::current_dir()?, path))
}

/// Same as [`resolve_input_path`] with an explicit base directory.
pub fn resolve_from(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let joined = base.join(path);
    joined.canonicalize().unwrap_or_else(|_| normalize(&joined))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
