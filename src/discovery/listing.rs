//! Release discovery from a flat version listing.
//!
//! The listing is a plain-text object, one version per line, served from a
//! static bucket next to the archives themselves. Responses carry an `ETag`
//! that is replayed through `If-None-Match` so an unchanged listing costs a
//! bodiless `304`.

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_NONE_MATCH};

use super::{ReleaseDiscovery, Resolution, newest};
use crate::archive::ArchiveFormat;
use crate::cache::CachedRelease;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::version::{Constraint, Version};

/// Default bucket URL publishing the listing and archives.
pub const DEFAULT_LISTING_URL: &str = "https://storage.googleapis.com/reproto-releases";

/// Resolves versions from `{base}/releases`.
#[derive(Debug, Clone)]
pub struct FlatListing {
    client: Client,
    base_url: String,
    format: ArchiveFormat,
}

impl FlatListing {
    /// Creates a backend reading the listing below `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, format: ArchiveFormat) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            base_url,
            format,
        }
    }
}

impl ReleaseDiscovery for FlatListing {
    fn resolve_latest(
        &self,
        constraint: &Constraint,
        cached: Option<&CachedRelease>,
    ) -> DiscoveryResult<Resolution> {
        let url = format!("{}/releases", self.base_url);
        let transport = |source| DiscoveryError::Transport {
            url: url.clone(),
            source,
        };

        let mut request = self.client.get(&url);
        if let Some(etag) = cached.and_then(|release| release.etag.as_deref()) {
            request = request.header(IF_NONE_MATCH, etag);
        }
        let response = request.send().map_err(transport)?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return match cached {
                Some(_) => Ok(Resolution::Unchanged),
                None => Err(DiscoveryError::UnchangedWithoutCache),
            };
        }
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.text().map_err(transport)?;

        let lines = body.lines().map(str::trim).filter(|line| !line.is_empty());
        let version =
            newest(lines, constraint, &url).ok_or_else(|| DiscoveryError::NotFound {
                constraint: constraint.to_string(),
            })?;
        let etag = etag.ok_or_else(|| DiscoveryError::MissingValidator { url: url.clone() })?;

        Ok(Resolution::Latest(CachedRelease::new(version, Some(etag))))
    }

    fn download_url(&self, _version: &Version, archive: &str) -> String {
        format!("{}/{archive}", self.base_url)
    }

    fn archive_format(&self) -> ArchiveFormat {
        self.format
    }

    fn cache_subdir(&self) -> &'static str {
        "listing"
    }
}
