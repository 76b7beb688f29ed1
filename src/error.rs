//! Error taxonomy for the relay pipeline.

use thiserror::Error;

/// A shorthand for results produced by the relay pipeline.
pub type RelayResult<T> = Result<T, RelayError>;

/// Everything that can go wrong while verifying and republishing a package.
///
/// Lookup and verification failures carry enough context (owner, repo, run
/// number, job and package names) to be actionable from the invocation log.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No workflow with the requested name exists in the source repository.
    #[error("workflow {name:?} not found in {owner}/{repo}")]
    WorkflowNotFound {
        owner: String,
        repo: String,
        name: String,
    },

    /// No run with the requested run number exists for the workflow.
    #[error("run #{run_number} of workflow {workflow:?} not found in {owner}/{repo}")]
    RunNotFound {
        owner: String,
        repo: String,
        workflow: String,
        run_number: u64,
    },

    /// No job with the requested name exists within the run.
    #[error("job {name:?} not found in run #{run_number} of {owner}/{repo}")]
    JobNotFound {
        owner: String,
        repo: String,
        run_number: u64,
        name: String,
    },

    /// The run's head branch is not in the caller-supplied allow-list.
    #[error("run #{run_number} is on branch {branch:?}, which is not permitted")]
    BranchNotPermitted { run_number: u64, branch: String },

    /// The job never reached the completed status within the configured deadline.
    #[error("job {job:?} did not complete within {waited_secs}s")]
    PollTimeout { job: String, waited_secs: u64 },

    /// No artifact with the requested name was produced by the run.
    #[error("artifact {name:?} not found in run {run_id}")]
    ArtifactNotFound { run_id: u64, name: String },

    /// The extracted payload named by the artifact is missing after unzipping.
    #[error("artifact {name:?} did not contain a payload file of the same name")]
    PayloadMissing { name: String },

    /// The job log carries no publish marker for the requested package.
    #[error("job {job:?} did not record publishing package {package:?}")]
    MarkerNotFound { job: String, package: String },

    /// The artifact's content hash disagrees with the hash recorded in the job log.
    #[error(
        "integrity mismatch for {package:?}: log records sha256 {expected}, artifact hashes to {actual}"
    )]
    IntegrityMismatch {
        package: String,
        expected: String,
        actual: String,
    },

    /// The package is not a kind this relay knows how to push.
    #[error("unsupported package kind: {package:?} (only .nupkg is supported)")]
    UnsupportedPackageKind { package: String },

    /// The registry push command exited unsuccessfully.
    #[error("failed to push {package:?} to the registry: {detail}")]
    RegistryPushFailed { package: String, detail: String },

    /// A required input is absent from both the action inputs and the event payload.
    #[error("missing input {name:?}")]
    MissingInput { name: String },

    /// An input was present but could not be parsed.
    #[error("invalid input {name:?}: {detail}")]
    InvalidInput { name: String, detail: String },

    /// A GitHub REST call failed.
    #[error(transparent)]
    Api(#[from] reqwest::Error),

    /// A local filesystem operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The artifact archive could not be read.
    #[error("failed to read archive: {0}")]
    Archive(#[from] async_zip::error::ZipError),

    /// The package file could not be read or rewritten.
    #[error("failed to rewrite package: {0}")]
    Package(#[from] zip::result::ZipError),
}
