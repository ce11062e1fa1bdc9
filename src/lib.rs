//! Resolves, provisions, and runs the reproto compiler for a build.
//!
//! The launcher picks the newest published reproto release matching a
//! version prefix, downloads the archive for the host platform into a
//! per-user cache, unpacks the executable, and runs `reproto compile java`
//! with the configured source roots, modules, and targets. An explicit
//! executable, a pinned artifact from a local Maven repository, or a bare
//! `reproto` on `PATH` can stand in for the download.
//!
//! Configuration is read through [`ReprotoCfg`] from configuration files,
//! `REPROTO_*` environment variables, and the command line.

pub mod archive;
pub mod artifact;
pub mod cache;
mod config;
pub mod discovery;
mod download;
mod error;
mod fs;
mod http;
mod observability;
mod platform;
pub mod process;
mod provision;
#[doc(hidden)]
pub mod test_support;
mod version;

pub use archive::{ArchiveFormat, ExtractRequest, extract};
pub use config::{DEFAULT_PLUGINS_DIR, DEFAULT_SOURCE_ROOT, LauncherSettings, ReprotoCfg};
pub use download::fetch;
pub use error::{
    ConfigError, ConfigResult, DiscoveryError, DiscoveryResult, DownloadError, DownloadResult,
    ExtractError, ExtractResult, LauncherError, ParseError, ProcessError, ProcessResult,
    ProvisionError, ProvisionErrorKind, ProvisionResult, Result,
};
pub use http::client;
pub use platform::{Arch, Os, Platform};
pub use provision::{Provisioner, TOOL_NAME, run, run_with};
pub use version::{Constraint, Version};
