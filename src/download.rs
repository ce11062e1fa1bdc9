//! Streams release archives into the cache.
//!
//! Bytes land in a temporary file next to the destination and are renamed
//! into place only once the body has been read completely, so an interrupted
//! download never looks like a cached archive.

use std::io::{self, BufWriter, Write};

use camino::Utf8Path;
use reqwest::blocking::Client;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{DownloadError, DownloadResult};
use crate::fs::ensure_dir_exists;
use crate::observability::LOG_TARGET;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Downloads `url` to `destination` and returns the number of bytes written.
///
/// # Errors
///
/// Returns [`DownloadError::Status`] for a non-success response,
/// [`DownloadError::Transport`] when the request cannot be sent, and
/// [`DownloadError::Io`] when the body cannot be streamed to disk or the
/// destination already exists.
pub fn fetch(client: &Client, url: &str, destination: &Utf8Path) -> DownloadResult<u64> {
    let io_error = |source: io::Error| DownloadError::Io {
        destination: destination.to_path_buf(),
        source,
    };

    info!(
        target: LOG_TARGET,
        url,
        destination = %destination,
        "downloading archive"
    );

    let parent = destination
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    ensure_dir_exists(parent).map_err(|err| io_error(io::Error::other(err)))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|source| DownloadError::Transport {
            url: url.to_owned(),
            source,
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }

    let staging = NamedTempFile::new_in(parent).map_err(io_error)?;
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, staging);
    let written = io::copy(&mut response, &mut writer).map_err(io_error)?;
    writer.flush().map_err(io_error)?;
    let staging = writer
        .into_inner()
        .map_err(|err| io_error(err.into_error()))?;
    staging.as_file().sync_all().map_err(io_error)?;
    staging
        .persist_noclobber(destination)
        .map_err(|err| io_error(err.error))?;

    debug!(
        target: LOG_TARGET,
        destination = %destination,
        bytes = written,
        "download complete"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use mockito::Server;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Target {
        _temp: TempDir,
        dir: Utf8PathBuf,
    }

    #[fixture]
    fn target() -> Target {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 path");
        Target { _temp: temp, dir }
    }

    fn client() -> Client {
        crate::http::client().expect("client")
    }

    fn entries(dir: &Utf8Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[rstest]
    fn body_is_written_to_destination(target: Target) {
        let mut server = Server::new();
        let body = vec![42_u8; 200_000];
        let _mock = server
            .mock("GET", "/reproto-0.3.1-linux-x86_64.tar.gz")
            .with_status(200)
            .with_body(&body)
            .create();
        let destination = target.dir.join("cache/reproto-0.3.1-linux-x86_64.tar.gz");

        let written = fetch(
            &client(),
            &format!("{}/reproto-0.3.1-linux-x86_64.tar.gz", server.url()),
            &destination,
        )
        .expect("download");

        assert_eq!(written, 200_000);
        assert_eq!(std::fs::read(&destination).expect("read"), body);
        assert_eq!(
            entries(&target.dir.join("cache")),
            vec!["reproto-0.3.1-linux-x86_64.tar.gz".to_owned()]
        );
    }

    #[rstest]
    fn failed_status_leaves_nothing_behind(target: Target) {
        let mut server = Server::new();
        let _mock = server.mock("GET", "/missing.tar.gz").with_status(404).create();
        let destination = target.dir.join("missing.tar.gz");

        let err = fetch(
            &client(),
            &format!("{}/missing.tar.gz", server.url()),
            &destination,
        )
        .expect_err("should fail");

        assert!(matches!(err, DownloadError::Status { status: 404, .. }));
        assert!(!destination.exists());
        assert!(entries(&target.dir).is_empty());
    }

    #[rstest]
    fn existing_destination_is_not_clobbered(target: Target) {
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/archive.zip")
            .with_status(200)
            .with_body("fresh")
            .create();
        let destination = target.dir.join("archive.zip");
        std::fs::write(&destination, "cached").expect("seed");

        let err = fetch(
            &client(),
            &format!("{}/archive.zip", server.url()),
            &destination,
        )
        .expect_err("should refuse to overwrite");

        assert!(matches!(err, DownloadError::Io { .. }));
        assert_eq!(std::fs::read_to_string(&destination).expect("read"), "cached");
        assert_eq!(entries(&target.dir), vec!["archive.zip".to_owned()]);
    }

    #[rstest]
    fn unusable_cache_directory_fails_before_requesting(target: Target) {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/archive.tar.gz")
            .with_status(200)
            .expect(0)
            .create();
        // a plain file where a parent of the cache directory should be
        std::fs::write(target.dir.join("cache"), "not a directory").expect("seed");
        let destination = target.dir.join("cache/listing/archive.tar.gz");

        let err = fetch(
            &client(),
            &format!("{}/archive.tar.gz", server.url()),
            &destination,
        )
        .expect_err("parent cannot be created");

        mock.assert();
        assert!(matches!(err, DownloadError::Io { .. }), "got {err:?}");
    }
}
