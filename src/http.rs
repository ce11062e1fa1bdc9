//! Shared blocking HTTP client.

use color_eyre::eyre::{Context, Result};
use reqwest::blocking::Client;

const USER_AGENT: &str = concat!("reproto-launcher/", env!("CARGO_PKG_VERSION"));

/// Builds the client used for release discovery and archive downloads.
///
/// # Errors
///
/// Returns an error when the TLS backend cannot be initialised.
pub fn client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("initialise HTTP client")
}
