//! Shared filesystem helpers that operate through `cap-std` ambient handles.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs::Dir};
use color_eyre::eyre::{Context, Result};
use std::io::{self, ErrorKind};

#[cfg(unix)]
use cap_std::fs::{Permissions, PermissionsExt};

/// Resolves a path to an ambient directory handle paired with the relative path component.
///
/// Absolute paths are opened relative to the ambient root; relative paths reuse the current
/// working directory.
pub(crate) fn ambient_dir_and_path(path: &Utf8Path) -> Result<(Dir, Utf8PathBuf)> {
    if path.has_root() {
        let stripped = path
            .strip_prefix("/")
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf());
        let dir = Dir::open_ambient_dir("/", ambient_authority())
            .context("open ambient root directory")?;
        Ok((dir, stripped))
    } else {
        let dir = Dir::open_ambient_dir(".", ambient_authority())
            .context("open ambient working directory")?;
        Ok((dir, path.to_path_buf()))
    }
}

/// Ensures the provided path exists, creating intermediate directories when required.
pub(crate) fn ensure_dir_exists(path: &Utf8Path) -> Result<()> {
    let (dir, relative) = ambient_dir_and_path(path)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }

    dir.create_dir_all(relative.as_std_path())
        .or_else(|err| {
            if err.kind() == ErrorKind::AlreadyExists {
                Ok(())
            } else {
                Err(err)
            }
        })
        .with_context(|| format!("create {}", path.as_str()))
}

/// Ensures the parent directory of `path` exists.
pub(crate) fn ensure_parent_exists(path: &Utf8Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}

/// Applies the provided POSIX mode to the given path when it exists.
#[cfg(unix)]
pub(crate) fn set_permissions(path: &Utf8Path, mode: u32) -> Result<()> {
    let (dir, relative) = ambient_dir_and_path(path)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }

    dir.set_permissions(relative.as_std_path(), Permissions::from_mode(mode))
        .with_context(|| format!("chmod {}", path.as_str()))
}

/// POSIX modes have no meaning on this platform.
#[cfg(not(unix))]
pub(crate) fn set_permissions(_path: &Utf8Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Returns `true` when `path` is a regular file with at least one execute bit set.
#[cfg(unix)]
pub(crate) fn is_executable(path: &Utf8Path) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::metadata(path)
        .map(|m| m.is_file() && (m.permissions().mode() & 0o111) != 0)
        .unwrap_or(false)
}

/// Returns `true` when `path` is a regular file.
#[cfg(not(unix))]
pub(crate) fn is_executable(path: &Utf8Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Makes `path` absolute against the current working directory.
pub(crate) fn absolute(path: &Utf8Path) -> io::Result<Utf8PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = Utf8PathBuf::from_path_buf(std::env::current_dir()?).map_err(|raw| {
        io::Error::new(
            ErrorKind::InvalidData,
            format!("current directory is not UTF-8: {}", raw.display()),
        )
    })?;
    Ok(cwd.join(path))
}
