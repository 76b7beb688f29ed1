//! Artifacts from GitHub REST API and related functions.

use std::fmt::Display;

use futures::Stream;
use serde::Deserialize;
use tokio_util::bytes::Bytes;
use tracing::{debug, info};

use crate::{
    error::RelayResult,
    github::{API_ROOT, Client},
};

/// Represents artifacts from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Artifacts {
    pub total_count: u64,
    pub artifacts: Vec<Artifact>,
}

/// Represents an artifact from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
    pub size_in_bytes: u64,
    pub archive_download_url: String,
    pub expired: bool,
}

impl Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} at {})",
            self.name, self.id, self.archive_download_url
        )
    }
}

/// Fetches the artifacts produced by a workflow run.
///
/// # Errors
///
/// Returns an error if the request or the JSON decoding fails.
pub async fn fetch_artifacts(
    client: &Client,
    owner: &str,
    repo: &str,
    run_id: u64,
) -> RelayResult<Vec<Artifact>> {
    let url = format!("{API_ROOT}/repos/{owner}/{repo}/actions/runs/{run_id}/artifacts");
    debug!("fetching artifacts from {url}…");

    let artifacts = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json::<Artifacts>()
        .await?;

    match artifacts.total_count {
        1 => info!("fetched 1 artifact from {url}"),
        count => info!("fetched {count} artifacts from {url}"),
    }
    Ok(artifacts.artifacts)
}

/// Downloads the specified artifact from GitHub as a stream of archive bytes.
///
/// # Errors
///
/// Returns an error if requesting the download fails, including the 410 the
/// API answers for expired artifacts.
pub async fn download_artifact(
    client: &Client,
    artifact: &Artifact,
) -> RelayResult<impl Stream<Item = Result<Bytes, reqwest::Error>> + use<>> {
    debug!(
        "requesting download from {}…",
        &artifact.archive_download_url
    );

    let response = client
        .get(&artifact.archive_download_url)
        .send()
        .await?
        .error_for_status()?;

    info!("requested download from {}", artifact.archive_download_url);
    Ok(response.bytes_stream())
}
