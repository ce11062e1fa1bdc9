//! Downloads and unpacks a release matching the configured constraint.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, eyre};
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::archive::{ArchiveFormat, ExtractRequest, extract};
use crate::cache::{CacheLock, VersionCache, resolve_version};
use crate::discovery::ReleaseDiscovery;
use crate::download::fetch;
use crate::error::{ProvisionError, ProvisionErrorKind, ProvisionResult};
use crate::fs::{ensure_dir_exists, is_executable};
use crate::observability::LOG_TARGET;
use crate::platform::Platform;
use crate::version::{Constraint, Version};

use super::TOOL_NAME;

/// Inputs for one auto-download attempt.
pub(super) struct AutoDownload<'a, D: ?Sized> {
    pub(super) discovery: &'a D,
    pub(super) client: &'a Client,
    pub(super) platform: Option<Platform>,
    pub(super) constraint: &'a Constraint,
    pub(super) cache_root: &'a Utf8Path,
    pub(super) cache_ttl: std::time::Duration,
    pub(super) plugins_dir: &'a Utf8Path,
}

impl<D> AutoDownload<'_, D>
where
    D: ReleaseDiscovery + ?Sized,
{
    /// Returns the provisioned executable, or `None` when no decision can be
    /// made for this host or constraint.
    pub(super) fn provision(&self) -> ProvisionResult<Option<Utf8PathBuf>> {
        let Some(platform) = self.platform else {
            debug!(target: LOG_TARGET, "host platform has no published releases");
            return Ok(None);
        };

        let cache_dir = self.cache_root.join(self.discovery.cache_subdir());
        let cache = VersionCache::in_dir(&cache_dir, self.cache_ttl);
        let Some(version) = resolve_version(&cache, self.discovery, self.constraint)? else {
            info!(
                target: LOG_TARGET,
                constraint = %self.constraint,
                "no published release matches"
            );
            return Ok(None);
        };

        let release = Release::new(&version, platform, self.discovery);
        let executable = self.plugins_dir.join(&release.executable_name);
        if is_executable(&executable) {
            info!(target: LOG_TARGET, path = %executable, "using cached executable");
            return Ok(Some(executable));
        }

        let _lock = CacheLock::acquire_exclusive(&cache_dir, &release.archive_name)
            .with_context(|| format!("lock {cache_dir} for {}", release.archive_name))?;
        if is_executable(&executable) {
            return Ok(Some(executable));
        }

        let archive = cache_dir.join(&release.archive_name);
        if !archive.is_file() {
            let url = self.discovery.download_url(&version, &release.archive_name);
            fetch(self.client, &url, &archive)?;
        }

        self.unpack(&release, &archive, &executable)?;
        Ok(Some(executable))
    }

    /// Extracts into a scratch directory beside the plugins directory and
    /// moves the executable into place.
    fn unpack(
        &self,
        release: &Release,
        archive: &Utf8Path,
        executable: &Utf8Path,
    ) -> ProvisionResult<()> {
        ensure_dir_exists(self.plugins_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".reproto-extract")
            .tempdir_in(self.plugins_dir)
            .with_context(|| format!("create staging directory in {}", self.plugins_dir))?;
        let staging_dir = Utf8Path::from_path(staging.path())
            .ok_or_else(|| eyre!("staging directory is not UTF-8"))?;

        let request = ExtractRequest::new(archive, release.format, staging_dir, &release.tool_entry)
            .rename_tool(&release.executable_name);
        let Some(unpacked) = extract(&request)? else {
            return Err(ProvisionError::new(
                ProvisionErrorKind::BinaryMissing,
                eyre!(
                    "archive {archive} did not contain binary: {}",
                    release.tool_entry
                ),
            ));
        };

        std::fs::rename(&unpacked, executable)
            .with_context(|| format!("move {unpacked} to {executable}"))?;
        if !is_executable(executable) {
            return Err(ProvisionError::new(
                ProvisionErrorKind::BinaryMissing,
                eyre!("extracted binary is not executable: {executable}"),
            ));
        }
        info!(target: LOG_TARGET, path = %executable, "provisioned executable");
        Ok(())
    }
}

/// Names derived from a resolved version and host platform.
struct Release {
    archive_name: String,
    executable_name: String,
    tool_entry: String,
    format: ArchiveFormat,
}

impl Release {
    fn new<D>(version: &Version, platform: Platform, discovery: &D) -> Self
    where
        D: ReleaseDiscovery + ?Sized,
    {
        let format = discovery.archive_format();
        Self {
            archive_name: archive_name(version, platform, format),
            executable_name: platform.executable_name(&format!("{TOOL_NAME}-{version}")),
            tool_entry: platform.executable_name(TOOL_NAME),
            format,
        }
    }
}

/// `reproto-{version}-{os}-{arch}.{ext}`
pub(super) fn archive_name(
    version: &Version,
    platform: Platform,
    format: ArchiveFormat,
) -> String {
    format!("{TOOL_NAME}-{version}-{platform}.{}", format.extension())
}
