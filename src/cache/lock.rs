//! Cross-process file locking for cache coordination.
//!
//! Concurrent launcher runs on one machine serialise the download and
//! extraction of a given archive through an advisory `flock(2)` lock. On
//! non-Unix platforms locking is a no-op.

use camino::Utf8Path;
use std::fs::{File, OpenOptions};
use std::io;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Subdirectory within the cache for lock files.
const LOCKS_SUBDIR: &str = ".locks";

/// Guard that holds a file lock until dropped.
#[derive(Debug)]
pub struct CacheLock {
    _file: File,
}

impl CacheLock {
    /// Acquires an exclusive lock for one cache key, blocking until it is free.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or the lock cannot
    /// be acquired.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use camino::Utf8Path;
    /// use reproto_launcher::cache::CacheLock;
    ///
    /// let cache_dir = Utf8Path::new("/tmp/reproto-cache/listing");
    /// let _lock = CacheLock::acquire_exclusive(cache_dir, "reproto-0.3.1-linux-x86_64.tar.gz")?;
    /// # Ok::<(), std::io::Error>(())
    /// ```
    #[cfg(unix)]
    pub fn acquire_exclusive(cache_dir: &Utf8Path, key: &str) -> io::Result<Self> {
        let locks_dir = cache_dir.join(LOCKS_SUBDIR);
        std::fs::create_dir_all(&locks_dir)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(locks_dir.join(format!("{key}.lock")))?;

        // SAFETY: `file` owns a valid open descriptor for the duration of the
        // call and is not moved or closed until the guard is dropped.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { _file: file })
    }

    /// Opens the lock file without locking it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created.
    #[cfg(not(unix))]
    pub fn acquire_exclusive(cache_dir: &Utf8Path, key: &str) -> io::Result<Self> {
        let locks_dir = cache_dir.join(LOCKS_SUBDIR);
        std::fs::create_dir_all(&locks_dir)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(locks_dir.join(format!("{key}.lock")))?;
        Ok(Self { _file: file })
    }
}
