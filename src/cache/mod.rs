//! Per-user cache of downloaded release archives and resolved versions.
//!
//! # Layout
//!
//! ```text
//! {cache_root}/
//!   {backend}/
//!     version.json
//!     reproto-{version}-{os}-{arch}.{ext}
//!     .locks/{archive}.lock
//! ```
//!
//! The cache root comes from [`resolve_cache_dir`]. Each discovery backend
//! gets its own subdirectory so validators from one server are never replayed
//! against another.

mod config;
mod lock;
mod version;

pub use config::{CACHE_DIR_ENV, resolve_cache_dir};
pub use lock::CacheLock;
pub use version::{
    CacheRead, CachedRelease, DEFAULT_TTL, VERSION_FILE, VersionCache, resolve_version,
};
