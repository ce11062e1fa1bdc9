//! Streams release archives onto disk.
//!
//! Entries are read one at a time from a tar+gzip or zip file. Each regular
//! file is created exclusively, filled with exactly the number of bytes its
//! header declares, and then given the permission bits recorded in the
//! archive. The entry named after the tool executable can be renamed on the
//! way out, and zip archives always get execute bits forced onto it because
//! zip writers frequently drop Unix modes. Tar links and special files are
//! skipped.

mod permissions;

pub use permissions::{Access, Permissions};

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Component, Path};
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExtractError, ExtractResult};
use crate::fs::{ensure_dir_exists, ensure_parent_exists, set_permissions};
use crate::observability::CACHE_LOG_TARGET;

const COPY_BUFFER_SIZE: usize = 8 * 1024;
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Container formats published for releases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// Gzip-compressed tarball.
    #[default]
    #[serde(rename = "tar.gz")]
    TarGz,
    /// Zip file.
    #[serde(rename = "zip")]
    Zip,
}

impl ArchiveFormat {
    /// File extension used in archive names.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }

    /// Whether stored modes can be trusted to carry execute bits.
    const fn reports_execute_bits(self) -> bool {
        matches!(self, Self::TarGz)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tar.gz" | "tgz" => Ok(Self::TarGz),
            "zip" => Ok(Self::Zip),
            other => Err(format!(
                "unsupported archive format `{other}`; expected tar.gz or zip"
            )),
        }
    }
}

/// Header data for one archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ArchiveEntry {
    name: String,
    size: u64,
    is_dir: bool,
    mode: u32,
}

/// Describes a single extraction.
#[derive(Debug, Clone, Copy)]
pub struct ExtractRequest<'a> {
    archive: &'a Utf8Path,
    format: ArchiveFormat,
    target: &'a Utf8Path,
    tool_entry: &'a str,
    rename_to: Option<&'a str>,
}

impl<'a> ExtractRequest<'a> {
    /// Extracts `archive` into `target`, watching for the member named `tool_entry`.
    #[must_use]
    pub const fn new(
        archive: &'a Utf8Path,
        format: ArchiveFormat,
        target: &'a Utf8Path,
        tool_entry: &'a str,
    ) -> Self {
        Self {
            archive,
            format,
            target,
            tool_entry,
            rename_to: None,
        }
    }

    /// Writes the tool executable under `name` instead of its archive name.
    #[must_use]
    pub const fn rename_tool(mut self, name: &'a str) -> Self {
        self.rename_to = Some(name);
        self
    }
}

/// Unpacks an archive and returns the path of the tool executable, if the
/// archive contained it.
///
/// # Errors
///
/// Returns [`ExtractError::CorruptArchive`] when an entry ends before its
/// declared size, [`ExtractError::UnsafePath`] for names escaping the target,
/// and [`ExtractError::Io`] for any other read or write failure, including a
/// file that already exists at an entry's destination.
pub fn extract(request: &ExtractRequest<'_>) -> ExtractResult<Option<Utf8PathBuf>> {
    debug!(
        target: CACHE_LOG_TARGET,
        archive = %request.archive,
        target_dir = %request.target,
        format = %request.format,
        "extracting archive"
    );
    ensure_dir_exists(request.target)
        .map_err(|err| ExtractError::io(format!("create {}", request.target), err))?;
    let file = File::open(request.archive)
        .map_err(|err| ExtractError::io(format!("open {}", request.archive), err))?;

    let mut sink = EntrySink {
        request,
        tool_path: None,
    };
    match request.format {
        ArchiveFormat::TarGz => extract_tar_gz(file, &mut sink)?,
        ArchiveFormat::Zip => extract_zip(file, &mut sink)?,
    }
    Ok(sink.tool_path)
}

fn extract_tar_gz(file: File, sink: &mut EntrySink<'_, '_>) -> ExtractResult<()> {
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let entries = archive
        .entries()
        .map_err(|err| ExtractError::io("read tar entries", err))?;
    for item in entries {
        let mut member = item.map_err(|err| ExtractError::io("read tar entry", err))?;
        let header = member.header();
        let name = member
            .path()
            .map_err(|err| ExtractError::io("decode tar entry name", err))?
            .to_string_lossy()
            .into_owned();
        let kind = header.entry_type();
        if !(kind.is_file() || kind.is_dir()) {
            debug!(
                target: CACHE_LOG_TARGET,
                archive = %sink.request.archive,
                entry = %name,
                kind = ?kind,
                "skipping link or special entry"
            );
            continue;
        }
        let entry = ArchiveEntry {
            is_dir: kind.is_dir(),
            mode: header.mode().unwrap_or(DEFAULT_FILE_MODE),
            size: member.size(),
            name,
        };
        sink.accept(&entry, &mut member)?;
    }
    Ok(())
}

fn extract_zip(file: File, sink: &mut EntrySink<'_, '_>) -> ExtractResult<()> {
    let mut archive =
        zip::ZipArchive::new(file).map_err(|err| ExtractError::io("open zip archive", err))?;
    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|err| ExtractError::io("read zip entry", err))?;
        let entry = ArchiveEntry {
            name: member.name().to_owned(),
            size: member.size(),
            is_dir: member.is_dir(),
            mode: member.unix_mode().unwrap_or(DEFAULT_FILE_MODE),
        };
        sink.accept(&entry, &mut member)?;
    }
    Ok(())
}

struct EntrySink<'r, 'a> {
    request: &'r ExtractRequest<'a>,
    tool_path: Option<Utf8PathBuf>,
}

impl EntrySink<'_, '_> {
    fn accept(&mut self, entry: &ArchiveEntry, reader: &mut impl Read) -> ExtractResult<()> {
        let relative = safe_relative_path(&entry.name)?;
        if entry.is_dir {
            let dir = self.request.target.join(relative);
            return ensure_dir_exists(&dir)
                .map_err(|err| ExtractError::io(format!("create {dir}"), err));
        }

        let is_tool = entry.name == self.request.tool_entry;
        let path = match (is_tool, self.request.rename_to) {
            (true, Some(name)) => self.request.target.join(name),
            _ => self.request.target.join(relative),
        };

        write_entry(entry, reader, &path)?;

        let mut perms = Permissions::from_mode(entry.mode);
        if is_tool && !self.request.format.reports_execute_bits() {
            perms = perms.with_execute();
        }
        set_permissions(&path, perms.mode())
            .map_err(|err| ExtractError::io(format!("chmod {path}"), err))?;

        debug!(
            target: CACHE_LOG_TARGET,
            archive = %self.request.archive,
            path = %path,
            mode = format_args!("{:o}", perms.mode()),
            "extracted"
        );
        if is_tool {
            self.tool_path = Some(path);
        }
        Ok(())
    }
}

/// Rejects names that are absolute or climb out of the extraction directory.
fn safe_relative_path(name: &str) -> ExtractResult<&Utf8Path> {
    let unsafe_path = || ExtractError::UnsafePath {
        entry: name.to_owned(),
    };
    let path = Path::new(name);
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(unsafe_path());
    }
    let relative = Utf8Path::new(name);
    if relative.as_str().is_empty() {
        return Err(unsafe_path());
    }
    Ok(relative)
}

/// Copies exactly `entry.size` bytes into a freshly created file.
fn write_entry(
    entry: &ArchiveEntry,
    reader: &mut impl Read,
    path: &Utf8Path,
) -> ExtractResult<()> {
    ensure_parent_exists(path)
        .map_err(|err| ExtractError::io(format!("create parent of {path}"), err))?;
    let mut out = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| ExtractError::io(format!("create {path}"), err))?;

    let corrupt = |copied: u64| ExtractError::CorruptArchive {
        entry: entry.name.clone(),
        expected: entry.size,
        copied,
    };

    let mut buffer = [0_u8; COPY_BUFFER_SIZE];
    let mut copied: u64 = 0;
    while copied < entry.size {
        let remaining = entry.size - copied;
        let want =
            usize::try_from(remaining).map_or(COPY_BUFFER_SIZE, |r| r.min(COPY_BUFFER_SIZE));
        let chunk = buffer.get_mut(..want).unwrap_or_default();
        let read = match reader.read(chunk) {
            Ok(0) => return Err(corrupt(copied)),
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Err(corrupt(copied)),
            Err(err) => return Err(ExtractError::io(format!("read {}", entry.name), err)),
        };
        let written = chunk.get(..read).unwrap_or_default();
        out.write_all(written)
            .map_err(|err| ExtractError::io(format!("write {path}"), err))?;
        copied += read as u64;
    }
    out.flush()
        .map_err(|err: io::Error| ExtractError::io(format!("flush {path}"), err))?;
    Ok(())
}
