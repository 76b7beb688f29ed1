//! Confirms that the downloaded artifact matches the log's publish record.
//!
//! The log is the provider-attested record of what the producing job claimed
//! to publish; the artifact store is a separate channel. Hash equality is the
//! only evidence binding the two.

use std::path::{Path, PathBuf};

use futures::TryStreamExt as _;
use sha2::{Digest as _, Sha256};
use tracing::{info, warn};

use crate::{
    error::{RelayError, RelayResult},
    github::{
        Client,
        artifact::{download_artifact, fetch_artifacts},
    },
    pipeline::{extract_archive::extract_archive, scanner::PublishRecord},
};

/// Downloads the artifact named by `record`, unpacks it under `workdir`, and
/// checks the payload's SHA-256 against the hash the log recorded.
///
/// Returns the path of the verified payload file.
///
/// # Errors
///
/// Returns [`RelayError::ArtifactNotFound`] when the run produced no artifact
/// of that name, [`RelayError::PayloadMissing`] when the archive does not
/// contain the expected file, and [`RelayError::IntegrityMismatch`] when the
/// hashes disagree.
pub async fn verify_artifact(
    client: &Client,
    owner: &str,
    repo: &str,
    run_id: u64,
    record: &PublishRecord,
    workdir: &Path,
) -> RelayResult<PathBuf> {
    let artifacts = fetch_artifacts(client, owner, repo, run_id).await?;
    let artifact = artifacts
        .into_iter()
        .find(|artifact| artifact.name == record.name)
        .ok_or_else(|| RelayError::ArtifactNotFound {
            run_id,
            name: record.name.clone(),
        })?;

    info!("downloading artifact {artifact}…");
    let stream = download_artifact(client, &artifact).await?;
    let reader = stream.map_err(std::io::Error::other).into_async_read();

    let unpacked = workdir.join("unpacked");
    extract_archive(reader, &unpacked).await?;
    info!("downloaded and extracted artifact {}", artifact.name);

    verify_payload(&unpacked, &record.name, record.hash.as_deref()).await
}

/// Hashes the extracted payload file and compares it to the recorded hash,
/// hex-encoded and case-insensitive.
///
/// A record without a hash (the older marker variants) skips the comparison;
/// the payload still has to exist.
///
/// # Errors
///
/// Returns [`RelayError::PayloadMissing`] or [`RelayError::IntegrityMismatch`].
pub async fn verify_payload(
    dir: &Path,
    name: &str,
    expected: Option<&str>,
) -> RelayResult<PathBuf> {
    let path = dir.join(name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| RelayError::PayloadMissing {
            name: name.to_owned(),
        })?;

    let actual = hex::encode(Sha256::digest(&bytes));

    match expected {
        Some(expected) if actual.eq_ignore_ascii_case(expected) => {
            info!("verified {name}: sha256 {actual}");
            Ok(path)
        }
        Some(expected) => Err(RelayError::IntegrityMismatch {
            package: name.to_owned(),
            expected: expected.to_owned(),
            actual,
        }),
        None => {
            warn!("no hash recorded for {name}, integrity unverified");
            Ok(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    #[tokio::test]
    async fn accepts_a_matching_hash() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("demo.nupkg"), b"payload")
            .await
            .unwrap();

        let path = verify_payload(dir.path(), "demo.nupkg", Some(&hash_of(b"payload")))
            .await
            .unwrap();
        assert!(path.ends_with("demo.nupkg"));
    }

    #[tokio::test]
    async fn hash_comparison_ignores_hex_case() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("demo.nupkg"), b"payload")
            .await
            .unwrap();

        let uppercase = hash_of(b"payload").to_uppercase();
        assert!(
            verify_payload(dir.path(), "demo.nupkg", Some(&uppercase))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn disagreeing_hash_is_an_integrity_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("demo.nupkg"), b"tampered")
            .await
            .unwrap();

        let err = verify_payload(dir.path(), "demo.nupkg", Some(&hash_of(b"payload")))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::IntegrityMismatch { .. }));
    }

    #[tokio::test]
    async fn missing_payload_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify_payload(dir.path(), "demo.nupkg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::PayloadMissing { .. }));
    }

    #[tokio::test]
    async fn hashless_record_passes_when_the_payload_exists() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("demo.nupkg"), b"payload")
            .await
            .unwrap();
        assert!(verify_payload(dir.path(), "demo.nupkg", None).await.is_ok());
    }
}
