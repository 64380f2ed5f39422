//! Long-path/UNC normalization for systems with path-length limits.
//!
//! On Windows, relative or short-UNC paths are rewritten with the `\\?\`
//! (or `\\?\UNC\`) escape so the Win32 API doesn't truncate them at
//! `MAX_PATH`. Everywhere else this is the identity function.

use std::path::{Path, PathBuf};

/// Rewrites `path` into the form the local platform's filesystem APIs can
/// open without a path-length limit. On non-Windows targets this returns
/// `path` unchanged (extended-length prefixes are a Windows-only concept).
#[cfg(windows)]
pub fn to_native_path(path: &Path) -> std::io::Result<PathBuf> {
    use std::path::Component;

    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let s = abs.to_string_lossy();
    if s.starts_with(r"\\?\") {
        return Ok(abs);
    }
    if let Some(rest) = s.strip_prefix(r"\\") {
        return Ok(PathBuf::from(format!(r"\\?\UNC\{rest}")));
    }
    // Normalize away any `.`/`..` components the caller left in, since the
    // `\\?\` prefix disables the usual Win32 path canonicalization.
    let mut out = PathBuf::new();
    for component in abs.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(PathBuf::from(format!(r"\\?\{}", out.display())))
}

/// Identity conversion: non-Windows targets have no equivalent path-length
/// limit for this crate to work around.
#[cfg(not(windows))]
pub fn to_native_path(path: &Path) -> std::io::Result<PathBuf> {
    Ok(path.to_path_buf())
}

#[cfg(all(test, not(windows)))]
mod test {
    use super::*;

    #[test]
    fn non_windows_is_identity() {
        let p = Path::new("some/relative/path.txt");
        assert_eq!(to_native_path(p).unwrap(), p);
    }
}
