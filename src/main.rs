//! Provisions the reproto compiler and runs `reproto compile java`.
//!
//! Configuration is provided via configuration files, `REPROTO_*`
//! environment variables, and command-line flags parsed by
//! [`OrthoConfig`](https://github.com/leynos/ortho-config). The binary exits
//! with status code `0` on success and `1` on error.

use color_eyre::eyre::{Result, eyre};
use reproto_launcher::{ReprotoCfg, run_with};
use tracing::Level;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cfg = ReprotoCfg::load_with_args(std::env::args_os()).map_err(|err| eyre!(err))?;
    let level = if cfg.debug.unwrap_or(false) {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let settings = cfg.to_settings().map_err(|err| eyre!(err))?;
    run_with(&settings).map_err(|err| eyre!(err))?;
    Ok(())
}
