//! Locates the reproto executable and runs it.
//!
//! The executable is taken from the first source that yields one:
//!
//! 1. the explicit `executable` override, which must be an executable file;
//! 2. the pinned `artifact`, copied from the local repository into the
//!    plugins directory;
//! 3. a release matching the `version` constraint, downloaded into the cache
//!    and unpacked into the plugins directory as `reproto-{version}`;
//! 4. the bare command name `reproto`, left to `PATH` lookup.
//!
//! Step 3 declines rather than fails when the host platform has no published
//! archives or no release matches.

mod auto;

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, eyre};
use reqwest::blocking::Client;
use tracing::info;

use self::auto::AutoDownload;
use crate::artifact::{ArtifactResolver, LocalRepository};
use crate::config::{LauncherSettings, ReprotoCfg};
use crate::discovery::{BackendKind, DiscoveryBackend, FlatListing, GithubReleases, ReleaseDiscovery};
use crate::error::{ConfigError, ProvisionError, ProvisionErrorKind, ProvisionResult};
use crate::fs::{absolute, ensure_dir_exists, is_executable};
use crate::observability::LOG_TARGET;
use crate::platform::Platform;
use crate::process::{Invocation, ProcessOutput};

/// Command name of the tool.
pub const TOOL_NAME: &str = "reproto";

/// Resolves the executable to run.
#[derive(Debug)]
pub struct Provisioner<'a, D, R> {
    settings: &'a LauncherSettings,
    platform: Option<Platform>,
    discovery: D,
    resolver: Option<R>,
    client: Client,
}

impl<'a> Provisioner<'a, DiscoveryBackend, LocalRepository> {
    /// Wires the configured backend, the local repository, and the detected
    /// host platform.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be created.
    pub fn from_settings(settings: &'a LauncherSettings) -> ProvisionResult<Self> {
        let client = crate::http::client()?;
        let discovery = match settings.backend {
            BackendKind::Github => DiscoveryBackend::from(GithubReleases::new(
                client.clone(),
                settings.api_url.clone(),
                settings.download_url.clone(),
                settings.repository.clone(),
            )),
            BackendKind::Listing => DiscoveryBackend::from(FlatListing::new(
                client.clone(),
                settings.download_url.clone(),
                settings.archive_format,
            )),
        };
        let resolver = settings.local_repository.clone().map(LocalRepository::new);
        Ok(Self::new(
            settings,
            Platform::current(),
            discovery,
            resolver,
            client,
        ))
    }
}

impl<'a, D, R> Provisioner<'a, D, R>
where
    D: ReleaseDiscovery,
    R: ArtifactResolver,
{
    /// Creates a provisioner from explicit collaborators.
    #[must_use]
    pub const fn new(
        settings: &'a LauncherSettings,
        platform: Option<Platform>,
        discovery: D,
        resolver: Option<R>,
        client: Client,
    ) -> Self {
        Self {
            settings,
            platform,
            discovery,
            resolver,
            client,
        }
    }

    /// Walks the resolution chain and returns the executable to run.
    ///
    /// # Errors
    ///
    /// Returns a [`ProvisionError`] of kind
    /// [`ProvisionErrorKind::ExecutableNotUsable`] for an override or artifact
    /// that is not executable, [`ProvisionErrorKind::ArtifactMissing`] when
    /// the pinned artifact cannot be found, and
    /// [`ProvisionErrorKind::BinaryMissing`] when a downloaded archive lacks
    /// the tool. Discovery, download, and extraction failures propagate.
    pub fn executable(&self) -> ProvisionResult<Utf8PathBuf> {
        if let Some(executable) = &self.settings.executable {
            return Self::explicit(executable);
        }
        if self.settings.artifact.is_some() {
            return self.pinned_artifact();
        }
        let auto = AutoDownload {
            discovery: &self.discovery,
            client: &self.client,
            platform: self.platform,
            constraint: &self.settings.constraint,
            cache_root: &self.settings.cache_root,
            cache_ttl: self.settings.cache_ttl,
            plugins_dir: &self.settings.plugins_dir,
        };
        if let Some(executable) = auto.provision()? {
            return Ok(executable);
        }
        info!(target: LOG_TARGET, "falling back to `{TOOL_NAME}` on PATH");
        Ok(Utf8PathBuf::from(TOOL_NAME))
    }

    fn explicit(executable: &Utf8Path) -> ProvisionResult<Utf8PathBuf> {
        let path = absolute(executable).context("resolve executable path")?;
        if !is_executable(&path) {
            return Err(ProvisionError::new(
                ProvisionErrorKind::ExecutableNotUsable,
                eyre!("`executable` is not an executable: {path}"),
            ));
        }
        Ok(path)
    }

    fn pinned_artifact(&self) -> ProvisionResult<Utf8PathBuf> {
        let missing = |report| ProvisionError::new(ProvisionErrorKind::ArtifactMissing, report);
        let coordinate = self
            .settings
            .artifact
            .as_ref()
            .ok_or_else(|| missing(eyre!("no artifact configured")))?;
        let resolver = self
            .resolver
            .as_ref()
            .ok_or_else(|| missing(eyre!("no local repository to resolve {coordinate} from")))?;
        let source = resolver.resolve(coordinate).map_err(missing)?;
        info!(target: LOG_TARGET, artifact = %coordinate, path = %source, "resolved artifact");

        let plugins_dir = &self.settings.plugins_dir;
        ensure_dir_exists(plugins_dir)?;
        let target = plugins_dir.join(coordinate.file_name());
        std::fs::copy(&source, &target).with_context(|| format!("copy {source} to {target}"))?;

        if !is_executable(&target) {
            return Err(ProvisionError::new(
                ProvisionErrorKind::ExecutableNotUsable,
                eyre!("`artifact` is not executable: {target}"),
            ));
        }
        Ok(target)
    }
}

/// Loads configuration, provisions the tool, and runs it.
///
/// # Errors
///
/// Returns an error when configuration is invalid, no executable can be
/// provisioned, or the tool fails.
pub fn run() -> crate::Result<()> {
    let settings = ReprotoCfg::load()?.to_settings()?;
    run_with(&settings)?;
    Ok(())
}

/// Provisions the tool and runs it with already loaded settings.
///
/// Returns `Ok(None)` when the run is skipped.
///
/// # Errors
///
/// Returns an error when `output` or every target is missing, no executable
/// can be provisioned, or the tool fails.
pub fn run_with(settings: &LauncherSettings) -> crate::Result<Option<ProcessOutput>> {
    if settings.skip {
        info!(target: LOG_TARGET, "skipping execution");
        return Ok(None);
    }
    let output = settings
        .output
        .as_ref()
        .ok_or_else(|| ConfigError::from(eyre!("REPROTO_OUTPUT: an output directory is required")))?;
    if settings.targets.is_empty() {
        return Err(ConfigError::from(eyre!("REPROTO_TARGETS: at least one target is required")).into());
    }

    let executable = Provisioner::from_settings(settings)?.executable()?;
    let mut invocation = Invocation::new(executable, output.clone())
        .debug(settings.debug)
        .paths(settings.paths.iter().cloned())
        .modules(settings.modules.iter().cloned())
        .targets(settings.targets.iter().cloned())
        .timeout(settings.timeout);
    if let Some(prefix) = &settings.package_prefix {
        invocation = invocation.package_prefix(prefix.clone());
    }
    Ok(Some(invocation.run()?))
}
