//! On-disk record of the last resolved release.
//!
//! The record is a small JSON document. Its modification time doubles as the
//! staleness clock, so rewriting an unchanged record is how a confirmed
//! release is kept fresh.

use std::io::ErrorKind;
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::discovery::{ReleaseDiscovery, Resolution};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::fs::ensure_parent_exists;
use crate::observability::CACHE_LOG_TARGET;
use crate::version::{Constraint, Version};

/// File name of the version record inside a backend cache directory.
pub const VERSION_FILE: &str = "version.json";

/// Default age after which a cached record is re-validated.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// A resolved version and the validator the backend handed out with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRelease {
    /// Resolved version.
    pub version: Version,
    /// Opaque validator (an HTTP `ETag`) for conditional requests.
    #[serde(default)]
    pub etag: Option<String>,
}

impl CachedRelease {
    /// Creates a record with an optional validator.
    #[must_use]
    pub const fn new(version: Version, etag: Option<String>) -> Self {
        Self { version, etag }
    }
}

/// Outcome of reading the cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRead {
    /// No usable record exists.
    Missing,
    /// A record was read.
    Present {
        /// The cached release.
        release: CachedRelease,
        /// Whether the record is older than the TTL.
        stale: bool,
    },
}

/// Version record stored at a fixed path with a time-to-live.
#[derive(Debug, Clone)]
pub struct VersionCache {
    path: Utf8PathBuf,
    ttl: Duration,
}

impl VersionCache {
    /// Creates a cache backed by `path`.
    #[must_use]
    pub const fn new(path: Utf8PathBuf, ttl: Duration) -> Self {
        Self { path, ttl }
    }

    /// Creates a cache backed by [`VERSION_FILE`] inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Utf8Path, ttl: Duration) -> Self {
        Self::new(dir.join(VERSION_FILE), ttl)
    }

    /// Location of the record.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the record.
    ///
    /// Unreadable or unparsable records never surface as errors. A record
    /// that fails to parse is deleted so the next run starts clean.
    #[must_use]
    pub fn read(&self) -> CacheRead {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return CacheRead::Missing,
            Err(err) => {
                warn!(
                    target: CACHE_LOG_TARGET,
                    path = %self.path,
                    error = %err,
                    "failed to read version cache"
                );
                return CacheRead::Missing;
            }
        };

        let release = match serde_json::from_str::<CachedRelease>(&raw) {
            Ok(release) => release,
            Err(err) => {
                warn!(
                    target: CACHE_LOG_TARGET,
                    path = %self.path,
                    error = %err,
                    "discarding corrupt version cache"
                );
                if let Err(remove_err) = std::fs::remove_file(&self.path) {
                    warn!(
                        target: CACHE_LOG_TARGET,
                        path = %self.path,
                        error = %remove_err,
                        "failed to delete corrupt version cache"
                    );
                }
                return CacheRead::Missing;
            }
        };

        let stale = self.age().is_none_or(|age| age >= self.ttl);
        CacheRead::Present { release, stale }
    }

    /// Age of the record; future modification times count as zero.
    fn age(&self) -> Option<Duration> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Overwrites the record, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or file cannot be written.
    pub fn write(&self, release: &CachedRelease) -> Result<()> {
        ensure_parent_exists(&self.path)?;
        let body = serde_json::to_string(release).context("serialise version cache")?;
        std::fs::write(&self.path, body).with_context(|| format!("write {}", self.path))
    }

    /// Overwrites the record, logging and swallowing failures.
    pub fn try_write(&self, release: &CachedRelease) {
        if let Err(err) = self.write(release) {
            warn!(
                target: CACHE_LOG_TARGET,
                path = %self.path,
                error = %format!("{err:#}"),
                "failed to update version cache"
            );
        }
    }
}

/// Resolves the version to provision, consulting the cache before the backend.
///
/// A record whose version does not satisfy `constraint` is ignored, so its
/// validator is never replayed. A fresh matching record is used as is.
/// Otherwise the backend is asked, passing the cached validator along. When
/// the backend cannot be reached and a stale matching record exists, the
/// stale record is used. `Ok(None)` means no release satisfies `constraint`
/// and the caller should fall back.
///
/// # Errors
///
/// Propagates discovery failures other than an unreachable backend, and
/// those too when no matching record exists to fall back on.
pub fn resolve_version<D>(
    cache: &VersionCache,
    discovery: &D,
    constraint: &Constraint,
) -> DiscoveryResult<Option<Version>>
where
    D: ReleaseDiscovery + ?Sized,
{
    let cached = match cache.read() {
        CacheRead::Missing => None,
        CacheRead::Present { release, .. } if !constraint.matches(&release.version) => {
            debug!(
                target: CACHE_LOG_TARGET,
                version = %release.version,
                constraint = %constraint,
                "ignoring cached version outside constraint"
            );
            None
        }
        CacheRead::Present {
            release,
            stale: false,
        } => {
            debug!(
                target: CACHE_LOG_TARGET,
                version = %release.version,
                "using fresh cached version"
            );
            return Ok(Some(release.version));
        }
        CacheRead::Present {
            release,
            stale: true,
        } => Some(release),
    };

    match discovery.resolve_latest(constraint, cached.as_ref()) {
        Ok(Resolution::Latest(release)) => {
            debug!(
                target: CACHE_LOG_TARGET,
                version = %release.version,
                constraint = %constraint,
                "resolved latest release"
            );
            cache.try_write(&release);
            Ok(Some(release.version))
        }
        Ok(Resolution::Unchanged) => {
            let release = cached.ok_or(DiscoveryError::UnchangedWithoutCache)?;
            debug!(
                target: CACHE_LOG_TARGET,
                version = %release.version,
                "release listing unchanged"
            );
            cache.try_write(&release);
            Ok(Some(release.version))
        }
        Ok(Resolution::NotFound) => Ok(None),
        Err(err) => match cached {
            Some(release) if err.is_unavailable() => {
                warn!(
                    target: CACHE_LOG_TARGET,
                    version = %release.version,
                    error = %err,
                    "release discovery failed; using stale cached version"
                );
                Ok(Some(release.version))
            }
            _ => Err(err),
        },
    }
}
