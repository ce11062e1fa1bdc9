//! Pinned tool binaries published to a Maven-style repository.
//!
//! A coordinate names one file, `groupId:artifactId:version[:type[:classifier]]`,
//! with the type defaulting to `exe`. Resolution is delegated to an
//! [`ArtifactResolver`]; [`LocalRepository`] looks the file up in a local
//! repository laid out the way Maven lays out `~/.m2/repository`.

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Result, bail, eyre};

use crate::error::{ConfigError, ConfigResult};

const DEFAULT_TYPE: &str = "exe";

/// Location of an artifact in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactCoordinate {
    /// Dotted group identifier.
    pub group_id: String,
    /// Artifact identifier.
    pub artifact_id: String,
    /// Exact artifact version.
    pub version: String,
    /// Packaging type, used as the file extension.
    pub kind: String,
    /// Optional classifier, typically a platform key.
    pub classifier: Option<String>,
}

impl ArtifactCoordinate {
    /// Parses `groupId:artifactId:version[:type[:classifier]]`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the coordinate has fewer than three or
    /// more than five parts, or any part is blank.
    ///
    /// # Examples
    ///
    /// ```
    /// use reproto_launcher::artifact::ArtifactCoordinate;
    ///
    /// let coordinate = ArtifactCoordinate::parse("se.tedro:reproto:0.3.1")?;
    /// assert_eq!(coordinate.kind, "exe");
    /// assert_eq!(coordinate.file_name(), "reproto-0.3.1.exe");
    /// # Ok::<(), reproto_launcher::ConfigError>(())
    /// ```
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let invalid = || {
            ConfigError::from(eyre!(
                "invalid artifact `{raw}`: expected groupId:artifactId:version[:type[:classifier]]"
            ))
        };

        let parts: Vec<&str> = raw.trim().split(':').map(str::trim).collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(invalid());
        }
        match parts.as_slice() {
            [group_id, artifact_id, version, rest @ ..] if rest.len() <= 2 => Ok(Self {
                group_id: (*group_id).to_owned(),
                artifact_id: (*artifact_id).to_owned(),
                version: (*version).to_owned(),
                kind: rest.first().copied().unwrap_or(DEFAULT_TYPE).to_owned(),
                classifier: rest.get(1).map(|classifier| (*classifier).to_owned()),
            }),
            _ => Err(invalid()),
        }
    }

    /// File name of the artifact inside its version directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{classifier}.{}",
                self.artifact_id, self.version, self.kind
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.kind),
        }
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.group_id, self.artifact_id, self.version, self.kind
        )?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        Ok(())
    }
}

impl FromStr for ArtifactCoordinate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Turns a coordinate into a file on local disk.
pub trait ArtifactResolver {
    /// Returns the path of the resolved artifact.
    ///
    /// # Errors
    ///
    /// Returns an error when the artifact cannot be located.
    fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<Utf8PathBuf>;
}

/// Resolves artifacts already present in a local Maven repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepository {
    root: Utf8PathBuf,
}

impl LocalRepository {
    /// Uses the repository rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/.m2/repository`, when the home directory is known.
    #[must_use]
    pub fn default_root() -> Option<Utf8PathBuf> {
        let home = Utf8PathBuf::from_path_buf(dirs::home_dir()?).ok()?;
        Some(home.join(".m2").join("repository"))
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Path the coordinate maps to, whether or not it exists.
    #[must_use]
    pub fn path_for(&self, coordinate: &ArtifactCoordinate) -> Utf8PathBuf {
        let mut path = self.root.clone();
        path.extend(coordinate.group_id.split('.'));
        path.push(&coordinate.artifact_id);
        path.push(&coordinate.version);
        path.push(coordinate.file_name());
        path
    }
}

impl ArtifactResolver for LocalRepository {
    fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<Utf8PathBuf> {
        let path = self.path_for(coordinate);
        if !path.is_file() {
            bail!("artifact {coordinate} not found in {}: expected {path}", self.root);
        }
        Ok(path)
    }
}
