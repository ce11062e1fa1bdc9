//! Domain error types for the reproto launcher.

use camino::Utf8PathBuf;
use color_eyre::Report;
use thiserror::Error;

/// Result alias for operations that may return a [`LauncherError`].
pub type Result<T> = std::result::Result<T, LauncherError>;

/// Result alias for release discovery.
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

/// Result alias for archive extraction.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// Result alias for archive downloads.
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Result alias for tool execution.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// Result alias for executable provisioning.
pub type ProvisionResult<T> = std::result::Result<T, ProvisionError>;

/// Result alias for configuration fallible operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level error exposed by the crate.
#[derive(Debug, Error)]
pub enum LauncherError {
    /// A version or constraint string was malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Release discovery failed.
    #[error("release discovery failed")]
    Discovery(#[from] DiscoveryError),
    /// The downloaded archive could not be unpacked.
    #[error("archive extraction failed")]
    Extract(#[from] ExtractError),
    /// The archive could not be downloaded.
    #[error("archive download failed")]
    Download(#[from] DownloadError),
    /// The tool ran and failed, or could not be run.
    #[error(transparent)]
    Process(#[from] ProcessError),
    /// No usable executable could be provisioned.
    #[error("provisioning failed")]
    Provision(#[from] ProvisionError),
    /// Configuration parsing failed.
    #[error("configuration parsing failed")]
    Config(#[from] ConfigError),
}

/// Raised when a dotted version string contains an invalid component.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid version `{input}`: component `{token}` is not an unsigned integer")]
pub struct ParseError {
    input: String,
    token: String,
}

impl ParseError {
    pub(crate) fn new(input: &str, token: &str) -> Self {
        Self {
            input: input.to_owned(),
            token: token.to_owned(),
        }
    }

    /// Returns the full string that failed to parse.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns the offending dot-separated component.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Failures raised while asking a remote backend for releases.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No published release satisfies the constraint.
    #[error("no remote release matches `{constraint}`")]
    NotFound {
        /// Constraint that nothing matched.
        constraint: String,
    },
    /// The server reported the listing unchanged but nothing was cached.
    #[error("server reported the release listing unchanged but no release is cached")]
    UnchangedWithoutCache,
    /// The listing response carried no validator to cache.
    #[error("release listing response from {url} carried no etag")]
    MissingValidator {
        /// Listing URL.
        url: String,
    },
    /// The server answered with an unexpected status code.
    #[error("{url} answered with HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status code returned.
        status: u16,
    },
    /// The request could not be sent or its body could not be decoded.
    #[error("request to {url} failed")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
}

impl DiscoveryError {
    /// Whether the backend could not be reached or answered with an error
    /// status, as opposed to giving a definitive answer.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::Transport { .. })
    }
}

/// Failures raised while unpacking an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive ended before an entry's declared size was read.
    #[error("corrupt archive: entry `{entry}` ended after {copied} of {expected} bytes")]
    CorruptArchive {
        /// Entry being copied.
        entry: String,
        /// Declared entry size.
        expected: u64,
        /// Bytes copied before the stream ran dry.
        copied: u64,
    },
    /// An entry name would escape the extraction directory.
    #[error("archive entry `{entry}` escapes the extraction directory")]
    UnsafePath {
        /// Offending entry name.
        entry: String,
    },
    /// Reading the archive or writing its contents failed.
    #[error("{context}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying failure.
        #[source]
        source: Report,
    },
}

impl ExtractError {
    pub(crate) fn io(context: impl Into<String>, source: impl Into<Report>) -> Self {
        Self::Io {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// Failures raised while downloading an archive into the cache.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The server answered with an unexpected status code.
    #[error("{url} answered with HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status code returned.
        status: u16,
    },
    /// The request could not be sent.
    #[error("request to {url} failed")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// Streaming the body to disk failed.
    #[error("failed to write {destination}")]
    Io {
        /// Destination file.
        destination: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
}

/// Failures raised while running the tool.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The tool exited with a non-zero status.
    #[error("{executable}: exited with non-zero status ({exit_code})")]
    Failed {
        /// Executable that was run.
        executable: Utf8PathBuf,
        /// Exit code reported by the operating system.
        exit_code: i32,
        /// Captured standard output lines.
        stdout: Vec<String>,
        /// Captured standard error lines.
        stderr: Vec<String>,
    },
    /// The tool was terminated by a signal.
    #[error("{executable}: terminated without an exit status")]
    Terminated {
        /// Executable that was run.
        executable: Utf8PathBuf,
    },
    /// The tool exceeded the configured timeout and was killed.
    #[error("{executable}: timed out after {timeout_secs}s")]
    TimedOut {
        /// Executable that was run.
        executable: Utf8PathBuf,
        /// Timeout that elapsed.
        timeout_secs: u64,
    },
    /// The tool could not be started.
    #[error("failed to spawn {executable}")]
    Spawn {
        /// Executable that was run.
        executable: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// Waiting for the tool or reading its output failed.
    #[error("failed to collect output from {executable}")]
    Io {
        /// Executable that was run.
        executable: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Returns the exit code when the tool ran to completion and failed.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

/// Categorises provisioning failures so callers can branch on structured errors.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum ProvisionErrorKind {
    /// Represents errors without a more specific semantic meaning.
    #[default]
    Other,
    /// The configured executable override is not an executable file.
    ExecutableNotUsable,
    /// The archive unpacked without producing the tool executable.
    BinaryMissing,
    /// The pinned artifact could not be located.
    ArtifactMissing,
}

/// Captures provisioning failures.
#[derive(Debug, Error)]
#[error("{report}")]
pub struct ProvisionError {
    kind: ProvisionErrorKind,
    #[source]
    report: Report,
}

impl ProvisionError {
    /// Constructs a new provisioning error with the provided kind and
    /// diagnostic report.
    #[must_use]
    pub const fn new(kind: ProvisionErrorKind, report: Report) -> Self {
        Self { kind, report }
    }

    /// Returns the semantic category for this failure.
    #[must_use]
    pub const fn kind(&self) -> ProvisionErrorKind {
        self.kind
    }

    /// Extracts the underlying diagnostic report.
    pub fn into_report(self) -> Report {
        self.report
    }
}

impl From<Report> for ProvisionError {
    fn from(report: Report) -> Self {
        Self::new(ProvisionErrorKind::Other, report)
    }
}

impl From<ConfigError> for ProvisionError {
    fn from(err: ConfigError) -> Self {
        let ConfigError(report) = err;
        Self::new(ProvisionErrorKind::Other, report)
    }
}

impl From<ParseError> for ProvisionError {
    fn from(err: ParseError) -> Self {
        Self::from(Report::new(err))
    }
}

impl From<DiscoveryError> for ProvisionError {
    fn from(err: DiscoveryError) -> Self {
        Self::from(Report::new(err))
    }
}

impl From<DownloadError> for ProvisionError {
    fn from(err: DownloadError) -> Self {
        Self::from(Report::new(err))
    }
}

impl From<ExtractError> for ProvisionError {
    fn from(err: ExtractError) -> Self {
        Self::from(Report::new(err))
    }
}

/// Captures configuration failures.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ConfigError(#[from] Report);
