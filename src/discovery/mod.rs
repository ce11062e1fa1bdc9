//! Remote release discovery.
//!
//! Two backends answer the same question, "which is the newest published
//! release satisfying this constraint?":
//!
//! - [`GithubReleases`] lists release tags through the GitHub REST API and
//!   has no notion of validators.
//! - [`FlatListing`] fetches a newline-delimited version list from a static
//!   bucket and supports conditional requests through `ETag`.
//!
//! Both skip entries that fail to parse rather than aborting. The backend is
//! chosen from configuration through [`DiscoveryBackend`].

mod github;
mod listing;

pub use github::{DEFAULT_API_URL, DEFAULT_DOWNLOAD_URL, DEFAULT_REPOSITORY, GithubReleases};
pub use listing::{DEFAULT_LISTING_URL, FlatListing};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::ArchiveFormat;
use crate::cache::CachedRelease;
use crate::error::{DiscoveryResult, ParseError};
use crate::observability::LOG_TARGET;
use crate::version::{Constraint, Version, latest_matching};

/// Result of asking a backend for the latest matching release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A matching release, with the validator to cache alongside it.
    Latest(CachedRelease),
    /// The server confirmed the cached release is still current.
    Unchanged,
    /// No published release satisfies the constraint.
    NotFound,
}

/// Contract shared by release discovery backends.
pub trait ReleaseDiscovery {
    /// Returns the highest published version matching `constraint`.
    ///
    /// `cached` carries the previously resolved release so backends that
    /// support conditional requests can ask whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::DiscoveryError`] when the server cannot be reached,
    /// answers with a failure status, or returns an unusable listing.
    fn resolve_latest(
        &self,
        constraint: &Constraint,
        cached: Option<&CachedRelease>,
    ) -> DiscoveryResult<Resolution>;

    /// URL from which the archive named `archive` of `version` is fetched.
    fn download_url(&self, version: &Version, archive: &str) -> String;

    /// Container format of the published archives.
    fn archive_format(&self) -> ArchiveFormat;

    /// Cache subdirectory holding this backend's archives and version record.
    fn cache_subdir(&self) -> &'static str;
}

/// Selects which backend answers discovery requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// GitHub release tags.
    Github,
    /// Flat version listing in a storage bucket.
    #[default]
    Listing,
}

impl BackendKind {
    /// Configuration name of the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Listing => "listing",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Self::Github),
            "listing" | "gcs" => Ok(Self::Listing),
            other => Err(format!(
                "unknown discovery backend `{other}`; expected github or listing"
            )),
        }
    }
}

/// The configured backend.
#[derive(Debug, Clone)]
pub enum DiscoveryBackend {
    /// GitHub release tags.
    Github(GithubReleases),
    /// Flat version listing.
    Listing(FlatListing),
}

impl DiscoveryBackend {
    fn inner(&self) -> &dyn ReleaseDiscovery {
        match self {
            Self::Github(backend) => backend,
            Self::Listing(backend) => backend,
        }
    }
}

impl ReleaseDiscovery for DiscoveryBackend {
    fn resolve_latest(
        &self,
        constraint: &Constraint,
        cached: Option<&CachedRelease>,
    ) -> DiscoveryResult<Resolution> {
        self.inner().resolve_latest(constraint, cached)
    }

    fn download_url(&self, version: &Version, archive: &str) -> String {
        self.inner().download_url(version, archive)
    }

    fn archive_format(&self) -> ArchiveFormat {
        self.inner().archive_format()
    }

    fn cache_subdir(&self) -> &'static str {
        self.inner().cache_subdir()
    }
}

impl From<GithubReleases> for DiscoveryBackend {
    fn from(backend: GithubReleases) -> Self {
        Self::Github(backend)
    }
}

impl From<FlatListing> for DiscoveryBackend {
    fn from(backend: FlatListing) -> Self {
        Self::Listing(backend)
    }
}

/// Picks the newest candidate matching `constraint`, logging skipped entries.
fn newest<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
    constraint: &Constraint,
    source: &str,
) -> Option<Version> {
    latest_matching(candidates, constraint, |raw, err: &ParseError| {
        debug!(
            target: LOG_TARGET,
            source,
            entry = raw,
            error = %err,
            "skipping unparsable release"
        );
    })
}

