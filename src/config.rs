//! Configuration surface and the settings derived from it.
//!
//! [`ReprotoCfg`] is loaded through `ortho_config`, so every option can come
//! from a configuration file, a `REPROTO_*` environment variable, or the
//! command line. [`ReprotoCfg::to_settings`] validates the raw values once and
//! resolves environment-dependent defaults such as the cache root, producing
//! the [`LauncherSettings`] the rest of the crate consumes.

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use color_eyre::eyre::{Context, eyre};
use ortho_config::OrthoConfig;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveFormat;
use crate::artifact::{ArtifactCoordinate, LocalRepository};
use crate::cache::{DEFAULT_TTL, resolve_cache_dir};
use crate::discovery::{
    BackendKind, DEFAULT_API_URL, DEFAULT_DOWNLOAD_URL, DEFAULT_LISTING_URL, DEFAULT_REPOSITORY,
};
use crate::error::{ConfigError, ConfigResult};
use crate::version::Constraint;

/// Source root used when no `paths` are configured.
pub const DEFAULT_SOURCE_ROOT: &str = "src/main/reproto";

/// Directory provisioned executables are placed in by default.
pub const DEFAULT_PLUGINS_DIR: &str = "target/reproto-plugins";

/// Raw launcher options.
///
/// # Examples
/// ```
/// use reproto_launcher::ReprotoCfg;
///
/// let cfg = ReprotoCfg::default();
/// assert!(cfg.executable.is_none());
/// assert!(cfg.targets.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, OrthoConfig, Default)]
#[ortho_config(prefix = "REPROTO")]
pub struct ReprotoCfg {
    /// Explicit path to a reproto executable; skips provisioning.
    pub executable: Option<Utf8PathBuf>,
    /// Pinned artifact coordinate, `groupId:artifactId:version[:type[:classifier]]`.
    pub artifact: Option<String>,
    /// Discovery backend, `github` or `listing`.
    pub backend: Option<String>,
    /// GitHub repository publishing releases.
    pub repository: Option<String>,
    /// Base URL of the GitHub API.
    pub api_url: Option<String>,
    /// Base URL archives are downloaded from.
    pub download_url: Option<String>,
    /// Version prefix the provisioned tool must match.
    ///
    /// Set on the command line with `--tool-version`, since `--version` is
    /// taken by clap. Unquoted environment values such as `0.3` arrive as
    /// numbers and are turned back into text; quote values with trailing
    /// zeros (`REPROTO_VERSION='"1.10"'`) to keep them exact.
    #[ortho_config(cli_long = "tool-version")]
    #[serde(default, deserialize_with = "version_text")]
    pub version: Option<String>,
    /// Passes `--debug` to the tool and enables debug logging.
    pub debug: Option<bool>,
    /// Specification source roots.
    #[serde(default)]
    pub paths: Vec<Utf8PathBuf>,
    /// Code generation modules to enable.
    #[serde(default)]
    pub modules: Vec<String>,
    /// Packages to compile.
    #[serde(default)]
    pub targets: Vec<String>,
    /// Prefix applied to generated packages.
    pub package_prefix: Option<String>,
    /// Directory receiving generated sources.
    pub output: Option<Utf8PathBuf>,
    /// Directory provisioned executables are placed in.
    pub plugins_dir: Option<Utf8PathBuf>,
    /// Root of the download cache.
    pub cache_dir: Option<Utf8PathBuf>,
    /// Seconds before a cached version is re-validated.
    pub cache_ttl_secs: Option<u64>,
    /// Seconds the tool may run before it is killed.
    pub timeout_secs: Option<u64>,
    /// Archive format published by the listing backend, `tar.gz` or `zip`.
    pub archive_format: Option<String>,
    /// Root of the local Maven repository used for pinned artifacts.
    pub local_repository: Option<Utf8PathBuf>,
    /// Skips the run entirely.
    pub skip: Option<bool>,
}

/// Validated launcher settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherSettings {
    /// Explicit executable override.
    pub executable: Option<Utf8PathBuf>,
    /// Pinned artifact.
    pub artifact: Option<ArtifactCoordinate>,
    /// Discovery backend.
    pub backend: BackendKind,
    /// GitHub repository publishing releases.
    pub repository: String,
    /// Base URL of the GitHub API.
    pub api_url: String,
    /// Base URL archives are downloaded from.
    pub download_url: String,
    /// Version prefix the provisioned tool must match.
    pub constraint: Constraint,
    /// Debug flag.
    pub debug: bool,
    /// Specification source roots.
    pub paths: Vec<Utf8PathBuf>,
    /// Code generation modules.
    pub modules: Vec<String>,
    /// Packages to compile.
    pub targets: Vec<String>,
    /// Prefix applied to generated packages.
    pub package_prefix: Option<String>,
    /// Directory receiving generated sources.
    pub output: Option<Utf8PathBuf>,
    /// Directory provisioned executables are placed in.
    pub plugins_dir: Utf8PathBuf,
    /// Root of the download cache.
    pub cache_root: Utf8PathBuf,
    /// Age after which a cached version is re-validated.
    pub cache_ttl: Duration,
    /// Optional limit on the tool's run time.
    pub timeout: Option<Duration>,
    /// Archive format published by the listing backend.
    pub archive_format: ArchiveFormat,
    /// Root of the local Maven repository.
    pub local_repository: Option<Utf8PathBuf>,
    /// Whether the run is skipped.
    pub skip: bool,
}

impl ReprotoCfg {
    /// Loads configuration from files and environment variables without
    /// parsing command-line arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a source cannot be parsed.
    pub fn load() -> ConfigResult<Self> {
        Self::load_with_args([OsString::from("reproto-launcher")])
    }

    /// Loads configuration, layering `args` over files and environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a source or argument cannot be parsed.
    pub fn load_with_args<I>(args: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = OsString>,
    {
        Self::load_from_iter(args).map_err(|err| ConfigError::from(eyre!(err)))
    }

    /// Validates the options and applies defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the version constraint, backend,
    /// archive format, or artifact coordinate is malformed.
    pub fn to_settings(&self) -> ConfigResult<LauncherSettings> {
        let backend = parse_option(self.backend.as_deref(), "REPROTO_BACKEND")?.unwrap_or_default();
        let archive_format =
            parse_option(self.archive_format.as_deref(), "REPROTO_ARCHIVE_FORMAT")?
                .unwrap_or_default();
        let constraint = self
            .version
            .as_deref()
            .map(Constraint::parse)
            .transpose()
            .context("REPROTO_VERSION is not a valid version prefix")?
            .unwrap_or_default();
        let artifact = self
            .artifact
            .as_deref()
            .map(ArtifactCoordinate::parse)
            .transpose()?;

        Ok(LauncherSettings {
            executable: self.executable.clone(),
            artifact,
            backend,
            repository: non_blank(self.repository.as_deref()).unwrap_or(DEFAULT_REPOSITORY).to_owned(),
            api_url: non_blank(self.api_url.as_deref()).unwrap_or(DEFAULT_API_URL).to_owned(),
            download_url: non_blank(self.download_url.as_deref())
                .unwrap_or(match backend {
                    BackendKind::Github => DEFAULT_DOWNLOAD_URL,
                    BackendKind::Listing => DEFAULT_LISTING_URL,
                })
                .to_owned(),
            constraint,
            debug: self.debug.unwrap_or(false),
            paths: if self.paths.is_empty() {
                vec![Utf8PathBuf::from(DEFAULT_SOURCE_ROOT)]
            } else {
                self.paths.clone()
            },
            modules: self.modules.clone(),
            targets: self.targets.clone(),
            package_prefix: non_blank(self.package_prefix.as_deref()).map(str::to_owned),
            output: self.output.clone(),
            plugins_dir: self
                .plugins_dir
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_PLUGINS_DIR)),
            cache_root: self.cache_dir.clone().unwrap_or_else(resolve_cache_dir),
            cache_ttl: self.cache_ttl_secs.map_or(DEFAULT_TTL, Duration::from_secs),
            timeout: self.timeout_secs.map(Duration::from_secs),
            archive_format,
            local_repository: self
                .local_repository
                .clone()
                .or_else(LocalRepository::default_root),
            skip: self.skip.unwrap_or(false),
        })
    }
}

/// Accepts a version prefix written as text or as a bare number.
fn version_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct VersionText;

    impl<'de> Visitor<'de> for VersionText {
        type Value = Option<String>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a version prefix as a string or number")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2>(self, deserializer: D2) -> Result<Self::Value, D2::Error>
        where
            D2: Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(Some(value.to_owned()))
        }

        fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
            Ok(Some(value))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }
    }

    deserializer.deserialize_option(VersionText)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

fn parse_option<T>(value: Option<&str>, name: &str) -> ConfigResult<Option<T>>
where
    T: std::str::FromStr<Err = String>,
{
    non_blank(value)
        .map(|raw| raw.parse::<T>().map_err(|err| ConfigError::from(eyre!("{name}: {err}"))))
        .transpose()
}
