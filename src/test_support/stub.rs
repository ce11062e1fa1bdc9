//! Stand-in tool executables for process and provisioning tests.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, Result};

/// Writes a `/bin/sh` script named `name` into `dir` and marks it executable.
///
/// # Errors
///
/// Returns an error when the script cannot be written or its mode changed.
pub fn write_stub_tool(dir: &Utf8Path, name: &str, body: &str) -> Result<Utf8PathBuf> {
    crate::fs::ensure_dir_exists(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, stub_script(body)).with_context(|| format!("write {path}"))?;
    crate::fs::set_permissions(&path, 0o755)?;
    Ok(path)
}

/// Full text of a stub script running `body`.
#[must_use]
pub fn stub_script(body: &str) -> String {
    format!("#!/bin/sh\n{body}\n")
}
