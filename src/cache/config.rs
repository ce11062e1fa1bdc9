//! Location of the per-user download cache.
//!
//! The cache root is resolved once at startup and handed to the components
//! that need it.

use camino::Utf8PathBuf;
use std::path::PathBuf;

/// Environment variable that overrides the cache root.
pub const CACHE_DIR_ENV: &str = "REPROTO_CACHE_DIR";

/// Subdirectory used below XDG-style cache homes.
const CACHE_SUBDIR: &str = "reproto-launcher";

/// Resolves the cache root from environment and XDG conventions.
///
/// The resolution order is:
///
/// 1. `REPROTO_CACHE_DIR` if set, non-blank, and valid UTF-8
/// 2. `$XDG_CACHE_HOME/reproto-launcher` if `XDG_CACHE_HOME` is set
/// 3. `~/.cache/reproto-launcher`
/// 4. `reproto-launcher` inside the system temporary directory
///
/// # Examples
///
/// ```
/// use reproto_launcher::cache::resolve_cache_dir;
///
/// let cache_dir = resolve_cache_dir();
/// assert!(!cache_dir.as_str().is_empty());
/// ```
#[must_use]
pub fn resolve_cache_dir() -> Utf8PathBuf {
    resolve_from_env()
        .or_else(resolve_from_xdg_cache)
        .or_else(resolve_from_home)
        .unwrap_or_else(resolve_from_temp)
}

fn non_blank_var(name: &str) -> Option<Utf8PathBuf> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Utf8PathBuf::from_path_buf(PathBuf::from(trimmed)).ok()
}

fn resolve_from_env() -> Option<Utf8PathBuf> {
    non_blank_var(CACHE_DIR_ENV)
}

fn resolve_from_xdg_cache() -> Option<Utf8PathBuf> {
    Some(non_blank_var("XDG_CACHE_HOME")?.join(CACHE_SUBDIR))
}

fn resolve_from_home() -> Option<Utf8PathBuf> {
    let home = dirs::home_dir()?;
    let path = Utf8PathBuf::from_path_buf(home).ok()?;
    Some(path.join(".cache").join(CACHE_SUBDIR))
}

fn resolve_from_temp() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(std::env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
        .join(CACHE_SUBDIR)
}
