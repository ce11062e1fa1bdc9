//! Walks the provisioning chain against a local release bucket.
#![cfg(unix)]

use std::io::Write as _;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use mockito::{Mock, Server, ServerGuard};
use reproto_launcher::artifact::{ArtifactCoordinate, LocalRepository};
use reproto_launcher::discovery::FlatListing;
use reproto_launcher::test_support::{stub_script, write_stub_tool};
use reproto_launcher::{
    ArchiveFormat, LauncherError, LauncherSettings, Platform, ProvisionErrorKind, Provisioner,
    ReprotoCfg, TOOL_NAME, run_with,
};
use rstest::{fixture, rstest};
use serial_test::serial;
use tempfile::TempDir;

const ARCHIVE: &str = "/reproto-0.3.1-linux-x86_64.tar.gz";

struct Sandbox {
    _temp: TempDir,
    root: Utf8PathBuf,
}

impl Sandbox {
    fn cfg(&self) -> ReprotoCfg {
        ReprotoCfg {
            version: Some("0.3".into()),
            cache_dir: Some(self.root.join("cache")),
            plugins_dir: Some(self.root.join("plugins")),
            local_repository: Some(self.root.join("m2")),
            output: Some(self.root.join("generated")),
            paths: vec![self.root.join("proto")],
            targets: vec!["io.example.api".into()],
            ..ReprotoCfg::default()
        }
    }

    fn settings(&self) -> LauncherSettings {
        self.cfg().to_settings().expect("settings")
    }
}

#[fixture]
fn sandbox() -> Sandbox {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 path");
    Sandbox { _temp: temp, root }
}

fn linux() -> Option<Platform> {
    Platform::from_names("linux", "x86_64")
}

fn tar_gz(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(*mode);
        header.set_size(data.len() as u64);
        builder
            .append_data(&mut header, name, *data)
            .expect("append entry");
    }
    let tar = builder.into_inner().expect("finish tar");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).expect("compress");
    encoder.finish().expect("finish gzip")
}

fn release_archive() -> Vec<u8> {
    let script = stub_script(r#"printf '%s\n' "$@""#);
    tar_gz(&[
        ("README", b"reproto release", 0o644),
        (TOOL_NAME, script.as_bytes(), 0o755),
    ])
}

fn listing_mock(server: &mut ServerGuard, hits: usize) -> Mock {
    server
        .mock("GET", "/releases")
        .with_status(200)
        .with_header("etag", "\"listing-1\"")
        .with_body("0.2.0\n0.3.0\n0.3.1\n0.4.0\n")
        .expect(hits)
        .create()
}

fn archive_mock(server: &mut ServerGuard, body: Vec<u8>, hits: usize) -> Mock {
    server
        .mock("GET", ARCHIVE)
        .with_status(200)
        .with_body(body)
        .expect(hits)
        .create()
}

fn provisioner<'a>(
    settings: &'a LauncherSettings,
    server: &ServerGuard,
    platform: Option<Platform>,
) -> Provisioner<'a, FlatListing, LocalRepository> {
    let client = reproto_launcher::client().expect("client");
    let discovery = FlatListing::new(client.clone(), server.url(), ArchiveFormat::TarGz);
    let resolver = settings.local_repository.clone().map(LocalRepository::new);
    Provisioner::new(settings, platform, discovery, resolver, client)
}

fn is_executable(path: &Utf8Path) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[rstest]
#[serial]
fn auto_download_unpacks_versioned_executable(sandbox: Sandbox) {
    let mut server = Server::new();
    let listing = listing_mock(&mut server, 1);
    let archive = archive_mock(&mut server, release_archive(), 1);
    let settings = sandbox.settings();

    let executable = provisioner(&settings, &server, linux())
        .executable()
        .expect("provision");

    listing.assert();
    archive.assert();
    assert_eq!(executable, sandbox.root.join("plugins/reproto-0.3.1"));
    assert!(is_executable(&executable));
    let cache = sandbox.root.join("cache/listing");
    assert!(cache.join("reproto-0.3.1-linux-x86_64.tar.gz").is_file());
    assert!(cache.join("version.json").is_file());
    assert!(
        !sandbox.root.join("plugins/README").exists(),
        "only the executable leaves the staging directory"
    );
}

#[rstest]
#[serial]
fn second_provision_reuses_cached_version_and_executable(sandbox: Sandbox) {
    let mut server = Server::new();
    let listing = listing_mock(&mut server, 1);
    let archive = archive_mock(&mut server, release_archive(), 1);
    let settings = sandbox.settings();

    let first = provisioner(&settings, &server, linux())
        .executable()
        .expect("first provision");
    let second = provisioner(&settings, &server, linux())
        .executable()
        .expect("second provision");

    assert_eq!(first, second);
    listing.assert();
    archive.assert();
}

#[rstest]
#[serial]
fn unsupported_platform_falls_back_to_path(sandbox: Sandbox) {
    let mut server = Server::new();
    let listing = listing_mock(&mut server, 0);
    let settings = sandbox.settings();

    let executable = provisioner(&settings, &server, None)
        .executable()
        .expect("provision");

    listing.assert();
    assert_eq!(executable, TOOL_NAME);
}

#[rstest]
#[serial]
fn unmatched_constraint_surfaces_discovery_error(sandbox: Sandbox) {
    let mut server = Server::new();
    let _listing = listing_mock(&mut server, 1);
    let settings = ReprotoCfg {
        version: Some("9".into()),
        ..sandbox.cfg()
    }
    .to_settings()
    .expect("settings");

    let err = provisioner(&settings, &server, linux())
        .executable()
        .expect_err("no release matches 9");

    assert_eq!(err.kind(), ProvisionErrorKind::Other);
    assert!(err.to_string().contains('9'), "got {err}");
}

#[rstest]
#[serial]
fn archive_without_tool_is_binary_missing(sandbox: Sandbox) {
    let mut server = Server::new();
    let _listing = listing_mock(&mut server, 1);
    let _archive = archive_mock(&mut server, tar_gz(&[("README", b"empty release", 0o644)]), 1);
    let settings = sandbox.settings();

    let err = provisioner(&settings, &server, linux())
        .executable()
        .expect_err("archive lacks the tool");

    assert_eq!(err.kind(), ProvisionErrorKind::BinaryMissing);
    assert!(!sandbox.root.join("plugins/reproto-0.3.1").exists());
}

#[rstest]
#[serial]
fn explicit_executable_short_circuits_discovery(sandbox: Sandbox) {
    let mut server = Server::new();
    let listing = listing_mock(&mut server, 0);
    let tool = write_stub_tool(&sandbox.root.join("bin"), "reproto", "exit 0").expect("stub");
    let settings = ReprotoCfg {
        executable: Some(tool.clone()),
        ..sandbox.cfg()
    }
    .to_settings()
    .expect("settings");

    let executable = provisioner(&settings, &server, linux())
        .executable()
        .expect("provision");

    listing.assert();
    assert_eq!(executable, tool);
}

#[rstest]
#[serial]
fn explicit_non_executable_is_rejected(sandbox: Sandbox) {
    let server = Server::new();
    let plain = sandbox.root.join("reproto.txt");
    std::fs::write(&plain, b"not a program").expect("write file");
    let settings = ReprotoCfg {
        executable: Some(plain),
        ..sandbox.cfg()
    }
    .to_settings()
    .expect("settings");

    let err = provisioner(&settings, &server, linux())
        .executable()
        .expect_err("should reject");

    assert_eq!(err.kind(), ProvisionErrorKind::ExecutableNotUsable);
}

#[rstest]
#[serial]
fn pinned_artifact_is_copied_into_plugins_dir(sandbox: Sandbox) {
    let server = Server::new();
    let coordinate = ArtifactCoordinate::parse("se.tedro:reproto:0.3.1").expect("coordinate");
    let repository = LocalRepository::new(sandbox.root.join("m2"));
    let source = repository.path_for(&coordinate);
    write_stub_tool(
        source.parent().expect("parent"),
        source.file_name().expect("file name"),
        "exit 0",
    )
    .expect("stub artifact");
    let settings = ReprotoCfg {
        artifact: Some(coordinate.to_string()),
        ..sandbox.cfg()
    }
    .to_settings()
    .expect("settings");

    let executable = provisioner(&settings, &server, linux())
        .executable()
        .expect("provision");

    assert_eq!(executable, sandbox.root.join("plugins/reproto-0.3.1.exe"));
    assert!(is_executable(&executable));
}

#[rstest]
#[serial]
fn absent_artifact_is_reported(sandbox: Sandbox) {
    let server = Server::new();
    let settings = ReprotoCfg {
        artifact: Some("se.tedro:reproto:0.3.1".into()),
        ..sandbox.cfg()
    }
    .to_settings()
    .expect("settings");

    let err = provisioner(&settings, &server, linux())
        .executable()
        .expect_err("artifact is absent");

    assert_eq!(err.kind(), ProvisionErrorKind::ArtifactMissing);
}

#[rstest]
#[serial]
fn skipped_run_does_nothing(sandbox: Sandbox) {
    let settings = ReprotoCfg {
        skip: Some(true),
        output: None,
        ..sandbox.cfg()
    }
    .to_settings()
    .expect("settings");

    let output = run_with(&settings).expect("skip");

    assert!(output.is_none());
}

#[rstest]
#[serial]
fn missing_output_is_a_config_error(sandbox: Sandbox) {
    let settings = ReprotoCfg {
        output: None,
        ..sandbox.cfg()
    }
    .to_settings()
    .expect("settings");

    let err = run_with(&settings).expect_err("should reject");

    assert!(matches!(err, LauncherError::Config(_)), "got {err:?}");
    assert!(format!("{err:?}").contains("REPROTO_OUTPUT"), "got {err:?}");
}

#[rstest]
#[serial]
fn missing_targets_are_a_config_error(sandbox: Sandbox) {
    let settings = ReprotoCfg {
        targets: Vec::new(),
        ..sandbox.cfg()
    }
    .to_settings()
    .expect("settings");

    let err = run_with(&settings).expect_err("should reject");

    assert!(matches!(err, LauncherError::Config(_)), "got {err:?}");
    assert!(format!("{err:?}").contains("REPROTO_TARGETS"), "got {err:?}");
}

#[rstest]
#[serial]
fn run_with_executes_the_configured_tool(sandbox: Sandbox) {
    let tool = write_stub_tool(
        &sandbox.root.join("bin"),
        "reproto",
        r#"printf '%s\n' "$@""#,
    )
    .expect("stub");
    let settings = ReprotoCfg {
        executable: Some(tool),
        modules: vec!["jackson".into()],
        package_prefix: Some("io.generated".into()),
        ..sandbox.cfg()
    }
    .to_settings()
    .expect("settings");

    let output = run_with(&settings).expect("run").expect("not skipped");

    let proto = sandbox.root.join("proto").into_string();
    let generated = sandbox.root.join("generated").into_string();
    assert_eq!(
        output.stdout,
        [
            "compile",
            "java",
            "--path",
            proto.as_str(),
            "--module",
            "jackson",
            "--out",
            generated.as_str(),
            "--package-prefix",
            "io.generated",
            "--package",
            "io.example.api",
        ]
    );
}
