//! Validates loading launcher options and translating them into settings.

use std::ffi::OsString;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reproto_launcher::discovery::{BackendKind, DEFAULT_API_URL, DEFAULT_REPOSITORY};
use reproto_launcher::{ArchiveFormat, Constraint, ReprotoCfg, Version};
use rstest::rstest;
use serial_test::serial;
use temp_env::with_vars;

fn args(values: &[&str]) -> Vec<OsString> {
    std::iter::once("reproto-launcher")
        .chain(values.iter().copied())
        .map(OsString::from)
        .collect()
}

/// Every option set on the raw configuration survives into the settings.
#[rstest]
fn to_settings_roundtrip() -> color_eyre::Result<()> {
    let cfg = ReprotoCfg {
        executable: Some(Utf8PathBuf::from("/opt/reproto/bin/reproto")),
        backend: Some("github".into()),
        repository: Some("example/reproto".into()),
        api_url: Some("https://ghe.example.com/api/v3/".into()),
        download_url: Some("https://ghe.example.com".into()),
        version: Some("0.3.1".into()),
        debug: Some(true),
        paths: vec![Utf8PathBuf::from("proto"), Utf8PathBuf::from("vendor/proto")],
        modules: vec!["jackson".into(), "lombok".into()],
        targets: vec!["io.example.api".into()],
        package_prefix: Some("io.generated".into()),
        output: Some(Utf8PathBuf::from("target/generated-sources/reproto")),
        plugins_dir: Some(Utf8PathBuf::from("/tmp/plugins")),
        cache_dir: Some(Utf8PathBuf::from("/tmp/cache")),
        cache_ttl_secs: Some(60),
        timeout_secs: Some(120),
        archive_format: Some("tgz".into()),
        local_repository: Some(Utf8PathBuf::from("/tmp/m2")),
        skip: Some(false),
        ..ReprotoCfg::default()
    };

    let settings = cfg.to_settings()?;

    assert_eq!(settings.executable.as_deref(), Some(Utf8Path::new("/opt/reproto/bin/reproto")));
    assert_eq!(settings.backend, BackendKind::Github);
    assert_eq!(settings.repository, "example/reproto");
    assert_eq!(settings.api_url, "https://ghe.example.com/api/v3/");
    assert_eq!(settings.download_url, "https://ghe.example.com");
    assert_eq!(settings.constraint, Constraint::parse("0.3.1")?);
    assert!(settings.debug);
    assert_eq!(settings.paths.len(), 2);
    assert_eq!(settings.modules, ["jackson", "lombok"]);
    assert_eq!(settings.targets, ["io.example.api"]);
    assert_eq!(settings.package_prefix.as_deref(), Some("io.generated"));
    assert_eq!(
        settings.output.as_deref(),
        Some(Utf8Path::new("target/generated-sources/reproto"))
    );
    assert_eq!(settings.plugins_dir, "/tmp/plugins");
    assert_eq!(settings.cache_root, "/tmp/cache");
    assert_eq!(settings.cache_ttl, Duration::from_secs(60));
    assert_eq!(settings.timeout, Some(Duration::from_secs(120)));
    assert_eq!(settings.archive_format, ArchiveFormat::TarGz);
    assert_eq!(settings.local_repository.as_deref(), Some(Utf8Path::new("/tmp/m2")));
    assert!(!settings.skip);
    Ok(())
}

/// The default configuration converts without error.
#[rstest]
#[serial]
fn to_settings_default_config() -> color_eyre::Result<()> {
    let settings = with_vars([("REPROTO_CACHE_DIR", Some("/tmp/reproto-cache"))], || {
        ReprotoCfg::default().to_settings()
    })?;

    assert_eq!(settings.repository, DEFAULT_REPOSITORY);
    assert_eq!(settings.api_url, DEFAULT_API_URL);
    assert_eq!(settings.cache_root, "/tmp/reproto-cache");
    assert!(settings.executable.is_none());
    assert!(settings.artifact.is_none());
    Ok(())
}

#[rstest]
#[serial]
fn load_reads_prefixed_environment() -> color_eyre::Result<()> {
    let cfg = with_vars(
        [
            ("REPROTO_VERSION", Some("0.4")),
            ("REPROTO_BACKEND", Some("gcs")),
            ("REPROTO_CACHE_DIR", Some("/tmp/env-cache")),
            ("REPROTO_TIMEOUT_SECS", Some("45")),
            ("REPROTO_SKIP", Some("true")),
        ],
        ReprotoCfg::load,
    )?;

    assert_eq!(cfg.version.as_deref(), Some("0.4"));
    let settings = cfg.to_settings()?;
    assert_eq!(settings.constraint.to_string(), "0.4");
    assert_eq!(settings.backend, BackendKind::Listing);
    assert_eq!(settings.cache_root, "/tmp/env-cache");
    assert_eq!(settings.timeout, Some(Duration::from_secs(45)));
    assert!(settings.skip);
    Ok(())
}

#[rstest]
#[case::integer("1", "1")]
#[case::float("0.3", "0.3")]
#[case::quoted(r#""1.10""#, "1.10")]
#[serial]
fn numeric_looking_version_from_environment_is_kept_as_text(
    #[case] raw: &str,
    #[case] expected: &str,
) -> color_eyre::Result<()> {
    let cfg = with_vars([("REPROTO_VERSION", Some(raw))], ReprotoCfg::load)?;

    assert_eq!(cfg.version.as_deref(), Some(expected));
    assert_eq!(cfg.to_settings()?.constraint.to_string(), expected);
    Ok(())
}

#[rstest]
#[serial]
fn constraint_is_set_from_the_command_line() -> color_eyre::Result<()> {
    let cfg = with_vars([("REPROTO_VERSION", Some("0.2"))], || {
        ReprotoCfg::load_with_args(args(&["--tool-version", "0.4"]))
    })?;

    let settings = cfg.to_settings()?;
    assert_eq!(settings.constraint, Constraint::parse("0.4")?);
    Ok(())
}

/// Without a configured prefix every published release is a candidate.
#[rstest]
#[serial]
fn default_constraint_matches_every_release() -> color_eyre::Result<()> {
    let settings = with_vars([("REPROTO_VERSION", None::<&str>)], || {
        ReprotoCfg::load().and_then(|cfg| cfg.to_settings())
    })?;

    assert_eq!(settings.constraint, Constraint::any());
    assert_eq!(settings.constraint.to_string(), "*");
    for raw in ["0.3.1", "1", "12.0.4"] {
        assert!(settings.constraint.matches(&Version::parse(raw)?));
    }
    Ok(())
}

#[rstest]
#[serial]
fn command_line_overrides_environment() -> color_eyre::Result<()> {
    let cfg = with_vars([("REPROTO_OUTPUT", Some("from-env"))], || {
        ReprotoCfg::load_with_args(args(&["--output", "from-cli"]))
    })?;

    assert_eq!(cfg.output.as_deref(), Some(Utf8Path::new("from-cli")));
    Ok(())
}

#[rstest]
#[serial]
fn malformed_environment_value_names_the_variable() {
    let outcome = with_vars([("REPROTO_BACKEND", Some("ftp"))], || {
        ReprotoCfg::load().and_then(|cfg| cfg.to_settings())
    });

    let err = outcome.expect_err("ftp is not a backend");
    assert!(format!("{err:?}").contains("REPROTO_BACKEND"), "got {err:?}");
}
