//! Resolves a workflow name, run number, and job name to concrete IDs.

use tracing::info;

use crate::{
    config::{Config, RunTarget},
    error::{RelayError, RelayResult},
    github::{Client, Job, Workflow, WorkflowRun},
};

/// The concrete entities a [`RunTarget`] resolved to.
#[derive(Debug, Clone)]
pub struct Located {
    pub workflow: Workflow,
    pub run: WorkflowRun,
    pub job: Job,
}

/// First workflow whose name matches exactly.
pub fn workflow_by_name(workflows: Vec<Workflow>, name: &str) -> Option<Workflow> {
    workflows.into_iter().find(|workflow| workflow.name == name)
}

/// First run whose run number matches exactly.
pub fn run_by_number(runs: Vec<WorkflowRun>, run_number: u64) -> Option<WorkflowRun> {
    runs.into_iter().find(|run| run.run_number == run_number)
}

/// First job whose name matches exactly.
pub fn job_by_name(jobs: Vec<Job>, name: &str) -> Option<Job> {
    jobs.into_iter().find(|job| job.name == name)
}

/// Rejects runs whose head branch is outside the allow-list.
///
/// # Errors
///
/// Returns [`RelayError::BranchNotPermitted`] for a disallowed branch.
pub fn ensure_branch_permitted(config: &Config, run: &WorkflowRun) -> RelayResult<()> {
    if config.branch_permitted(&run.head_branch) {
        Ok(())
    } else {
        Err(RelayError::BranchNotPermitted {
            run_number: run.run_number,
            branch: run.head_branch.clone(),
        })
    }
}

/// Resolves `(workflow name, run number, job name)` to concrete entities via
/// three sequential list+find lookups.
///
/// The branch allow-list check happens right after the run lookup, before any
/// job polling. Each lookup fails fast; nothing is retried.
///
/// # Errors
///
/// Returns the `NotFound` error of the first lookup without a match, or
/// [`RelayError::BranchNotPermitted`].
pub async fn locate(client: &Client, config: &Config, target: &RunTarget) -> RelayResult<Located> {
    let owner = &config.source_owner;

    let workflows = client.list_workflows(owner, &target.repo).await?;
    let workflow = workflow_by_name(workflows, &target.workflow).ok_or_else(|| {
        RelayError::WorkflowNotFound {
            owner: owner.clone(),
            repo: target.repo.clone(),
            name: target.workflow.clone(),
        }
    })?;

    let runs = client
        .list_runs(owner, &target.repo, workflow.id, None)
        .await?;
    let run = run_by_number(runs, target.run_number).ok_or_else(|| RelayError::RunNotFound {
        owner: owner.clone(),
        repo: target.repo.clone(),
        workflow: target.workflow.clone(),
        run_number: target.run_number,
    })?;

    ensure_branch_permitted(config, &run)?;

    let jobs = client.list_jobs(owner, &target.repo, run.id).await?;
    let job = job_by_name(jobs, &target.job).ok_or_else(|| RelayError::JobNotFound {
        owner: owner.clone(),
        repo: target.repo.clone(),
        run_number: target.run_number,
        name: target.job.clone(),
    })?;

    info!(
        "located workflow {} run {} job {} for {owner}/{}",
        workflow.id, run.id, job.id, target.repo
    );
    Ok(Located { workflow, run, job })
}
