//! End-to-end checks of the scan → extract → verify → rewrite chain, using
//! in-memory archives instead of the GitHub API.

use std::io::{Cursor, Write as _};

use sha2::{Digest as _, Sha256};
use zip::{ZipWriter, write::SimpleFileOptions};

use nuget_relay::{
    config::Repository,
    error::RelayError,
    pipeline::{
        extract_archive::extract_archive,
        publisher::rewrite_repository_url,
        scanner::scan_log,
        verifier::verify_payload,
    },
};

const NUSPEC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package>
  <metadata>
    <id>demo</id>
    <version>1.0.0</version>
    <repository type="git" url="https://github.com/octo-org/builder" />
  </metadata>
</package>
"#;

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn package_bytes() -> Vec<u8> {
    zip_bytes(&[
        ("demo.nuspec", NUSPEC.as_bytes()),
        ("lib/net8.0/demo.dll", b"binary payload"),
    ])
}

#[tokio::test]
async fn verified_package_reaches_the_rewrite_step() {
    let package = package_bytes();
    let digest = hex::encode(Sha256::digest(&package));
    let archive = zip_bytes(&[("demo.1.0.0.nupkg", &package)]);

    let log = format!(
        "2024-05-01T10:00:00Z Packing demo\n\
         2024-05-01T10:00:01Z --- Uploaded package demo.1.0.0.nupkg as a GitHub artifact (SHA256: {digest}) ---\n"
    );
    let records = scan_log(&log);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.name, "demo.1.0.0.nupkg");

    let workdir = tempfile::tempdir().unwrap();
    let unpacked = workdir.path().join("unpacked");
    extract_archive(futures::io::Cursor::new(archive), &unpacked)
        .await
        .unwrap();

    let payload = verify_payload(&unpacked, &record.name, record.hash.as_deref())
        .await
        .unwrap();

    let destination = Repository {
        owner: String::from("me"),
        repo: String::from("mirror"),
    };
    let rewritten = rewrite_repository_url(&payload, &destination, workdir.path()).unwrap();

    let mut reopened = zip::ZipArchive::new(std::fs::File::open(&rewritten).unwrap()).unwrap();
    let mut nuspec = String::new();
    std::io::Read::read_to_string(&mut reopened.by_name("demo.nuspec").unwrap(), &mut nuspec)
        .unwrap();
    assert!(nuspec.contains("https://github.com/me/mirror"));
}

#[tokio::test]
async fn tampered_artifact_never_reaches_publishing() {
    let package = package_bytes();
    let digest = hex::encode(Sha256::digest(&package));

    let mut tampered = package.clone();
    tampered.extend_from_slice(b"\0");
    let archive = zip_bytes(&[("demo.1.0.0.nupkg", &tampered)]);

    let log = format!(
        "--- Uploaded package demo.1.0.0.nupkg as a GitHub artifact (SHA256: {digest}) ---"
    );
    let record = &scan_log(&log)[0];

    let workdir = tempfile::tempdir().unwrap();
    let unpacked = workdir.path().join("unpacked");
    extract_archive(futures::io::Cursor::new(archive), &unpacked)
        .await
        .unwrap();

    let err = verify_payload(&unpacked, &record.name, record.hash.as_deref())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::IntegrityMismatch { .. }));
}
