//! Data models and lookups for the GitHub Actions REST surface.

use reqwest::{RequestBuilder, header};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::RelayResult;

pub mod artifact;

pub(crate) const API_ROOT: &str = "https://api.github.com";

/// Status value of a run or job that will not change any more.
pub const STATUS_COMPLETED: &str = "completed";

/// Represents a GitHub Actions workflow from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Workflow {
    pub id: u64,
    pub name: String,
    pub path: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Workflows {
    workflows: Vec<Workflow>,
}

/// Represents a GitHub Actions workflow run from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowRun {
    pub id: u64,
    pub run_number: u64,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub head_branch: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRuns {
    workflow_runs: Vec<WorkflowRun>,
}

/// Represents a job of a workflow run from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
}

impl Job {
    /// Whether the job has reached its terminal status.
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}

#[derive(Debug, Deserialize)]
struct Jobs {
    jobs: Vec<Job>,
}

/// A GitHub REST client bound to one token.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    token: String,
}

impl Client {
    /// Creates a client that authenticates with the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
        }
    }

    /// Builds a request for GitHub REST API.
    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.http
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(&self.token)
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "nuget-relay/1.0")
    }

    /// Lists the workflows defined in a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the JSON decoding fails.
    pub async fn list_workflows(&self, owner: &str, repo: &str) -> RelayResult<Vec<Workflow>> {
        let url = format!("{API_ROOT}/repos/{owner}/{repo}/actions/workflows?per_page=100");
        debug!("fetching workflows from {url}…");

        let workflows = self
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Workflows>()
            .await?
            .workflows;

        info!("fetched {} workflows from {owner}/{repo}", workflows.len());
        Ok(workflows)
    }

    /// Lists the runs of a workflow, optionally restricted to one branch.
    ///
    /// Runs arrive in the provider's order, reverse-chronological.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the JSON decoding fails.
    pub async fn list_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        branch: Option<&str>,
    ) -> RelayResult<Vec<WorkflowRun>> {
        debug!("fetching runs of workflow {workflow_id} in {owner}/{repo}…");

        let runs = self
            .runs_request(owner, repo, workflow_id, branch)
            .send()
            .await?
            .error_for_status()?
            .json::<WorkflowRuns>()
            .await?
            .workflow_runs;

        info!("fetched {} runs of workflow {workflow_id} from {owner}/{repo}", runs.len());
        Ok(runs)
    }

    fn runs_request(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        branch: Option<&str>,
    ) -> RequestBuilder {
        let url =
            format!("{API_ROOT}/repos/{owner}/{repo}/actions/workflows/{workflow_id}/runs");
        let mut request = self.get(&url).query(&[("per_page", "100")]);
        if let Some(branch) = branch {
            request = request.query(&[("branch", branch)]);
        }
        request
    }

    /// Lists the jobs of a workflow run.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the JSON decoding fails.
    pub async fn list_jobs(&self, owner: &str, repo: &str, run_id: u64) -> RelayResult<Vec<Job>> {
        let url = format!("{API_ROOT}/repos/{owner}/{repo}/actions/runs/{run_id}/jobs?per_page=100");
        debug!("fetching jobs from {url}…");

        let jobs = self
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Jobs>()
            .await?
            .jobs;

        info!("fetched {} jobs of run {run_id} from {owner}/{repo}", jobs.len());
        Ok(jobs)
    }

    /// Fetches the current state of a single job.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the JSON decoding fails.
    pub async fn get_job(&self, owner: &str, repo: &str, job_id: u64) -> RelayResult<Job> {
        let url = format!("{API_ROOT}/repos/{owner}/{repo}/actions/jobs/{job_id}");
        debug!("fetching job state from {url}…");

        Ok(self
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Job>()
            .await?)
    }

    /// Downloads the plain-text log of a job.
    ///
    /// The API answers with a redirect to blob storage; the client follows it
    /// and the authorization header is dropped on the cross-host hop.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be read.
    pub async fn download_job_log(&self, owner: &str, repo: &str, job_id: u64) -> RelayResult<String> {
        let url = format!("{API_ROOT}/repos/{owner}/{repo}/actions/jobs/{job_id}/logs");
        debug!("downloading job log from {url}…");

        let log = self
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        info!("downloaded {} bytes of log for job {job_id}", log.len());
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_filter_is_percent_encoded() {
        let client = Client::new("token");
        let request = client
            .runs_request("octo-org", "builder", 42, Some("feature/x y"))
            .build()
            .unwrap();

        let query = request.url().query().unwrap();
        assert!(query.contains("per_page=100"));
        assert!(query.contains("branch=feature%2Fx"));
        assert!(!query.contains(' '));
    }

    #[test]
    fn runs_without_a_branch_filter_omit_the_parameter() {
        let client = Client::new("token");
        let request = client
            .runs_request("octo-org", "builder", 42, None)
            .build()
            .unwrap();
        assert!(!request.url().query().unwrap().contains("branch="));
    }
}
