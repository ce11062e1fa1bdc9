//! Release discovery through the GitHub REST API.

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use super::{ReleaseDiscovery, Resolution, newest};
use crate::archive::ArchiveFormat;
use crate::cache::CachedRelease;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::version::{Constraint, Version};

/// Default base URL of the GitHub API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default base URL release assets are downloaded from.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://github.com";

/// Default repository publishing reproto releases.
pub const DEFAULT_REPOSITORY: &str = "reproto/reproto";

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Resolves versions from a repository's release tags.
///
/// Every call is a live query; no validator is produced.
#[derive(Debug, Clone)]
pub struct GithubReleases {
    client: Client,
    api_url: String,
    download_url: String,
    repository: String,
}

impl GithubReleases {
    /// Creates a backend querying `repository` through `api_url`.
    #[must_use]
    pub fn new(
        client: Client,
        api_url: impl Into<String>,
        download_url: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: trimmed(api_url.into()),
            download_url: trimmed(download_url.into()),
            repository: repository.into(),
        }
    }

    fn releases_url(&self) -> String {
        format!("{}/repos/{}/releases", self.api_url, self.repository)
    }
}

fn trimmed(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

impl ReleaseDiscovery for GithubReleases {
    fn resolve_latest(
        &self,
        constraint: &Constraint,
        _cached: Option<&CachedRelease>,
    ) -> DiscoveryResult<Resolution> {
        let url = self.releases_url();
        let transport = |source| DiscoveryError::Transport {
            url: url.clone(),
            source,
        };

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }
        let releases: Vec<Release> = response.json().map_err(transport)?;

        let tags = releases.iter().map(|release| release.tag_name.as_str());
        Ok(newest(tags, constraint, &url).map_or(Resolution::NotFound, |version| {
            Resolution::Latest(CachedRelease::new(version, None))
        }))
    }

    fn download_url(&self, version: &Version, archive: &str) -> String {
        format!(
            "{}/{}/releases/download/{version}/{archive}",
            self.download_url, self.repository
        )
    }

    fn archive_format(&self) -> ArchiveFormat {
        ArchiveFormat::TarGz
    }

    fn cache_subdir(&self) -> &'static str {
        "github"
    }
}
