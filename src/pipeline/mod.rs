//! The verification pipeline: locate, poll, scan, verify, publish.

use tracing::{error, info};

use crate::{
    config::{BatchTarget, Config, RunTarget},
    error::{RelayError, RelayResult},
    github::{Client, Job, STATUS_COMPLETED, WorkflowRun},
};

pub mod extract_archive;
pub mod locator;
pub mod poller;
pub mod publisher;
pub mod scanner;
pub mod verifier;

/// One recorded failure of a batch unit.
#[derive(Debug)]
pub struct Failure {
    pub context: String,
    pub error: RelayError,
}

/// The accumulated outcome of a batch scan.
#[derive(Debug, Default)]
pub struct Report {
    failures: Vec<Failure>,
    published: usize,
}

impl Report {
    /// Records a failed unit and keeps going.
    pub fn record(&mut self, context: String, error: RelayError) {
        error!("{context}: {error}");
        self.failures.push(Failure { context, error });
    }

    /// Counts a successfully republished package.
    pub fn count_published(&mut self) {
        self.published += 1;
    }

    /// Whether any unit failed.
    pub fn is_failed(&self) -> bool {
        !self.failures.is_empty()
    }

    /// The recorded failures, in encounter order.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// How many packages were pushed.
    pub fn published(&self) -> usize {
        self.published
    }
}

/// Verifies and republishes one package from one identified run.
///
/// The stages run strictly in order; the first failure aborts the pipeline.
///
/// # Errors
///
/// Returns the first stage error: lookup failures, a poll timeout, a missing
/// publish marker, an integrity mismatch, or a registry push failure.
pub async fn run_single(client: &Client, config: &Config, target: &RunTarget) -> RelayResult<()> {
    let owner = &config.source_owner;
    let located = locator::locate(client, config, target).await?;

    let job_id = located.job.id;
    let job = poller::poll_until_complete(
        located.job,
        config.poll_interval,
        config.poll_timeout,
        || client.get_job(owner, &target.repo, job_id),
    )
    .await?;

    let log = client.download_job_log(owner, &target.repo, job.id).await?;
    let records = scanner::scan_log(&log);
    info!(
        "found {} publish records in the log of job {:?}",
        records.len(),
        job.name
    );

    let record = scanner::pick_record(&records, &target.package, target.version.as_deref())
        .ok_or_else(|| RelayError::MarkerNotFound {
            job: job.name.clone(),
            package: target.package.clone(),
        })?;

    let workdir = tempfile::tempdir()?;
    let payload = verifier::verify_artifact(
        client,
        owner,
        &target.repo,
        located.run.id,
        record,
        workdir.path(),
    )
    .await?;

    publisher::publish(config, &payload, workdir.path()).await?;
    info!("republished {:?} to {}/{}", target.package, config.destination.owner, config.destination.repo);
    Ok(())
}

/// Scans every run on the named branches of several repositories, verifying
/// and republishing each package the jobs claim to have published.
///
/// Iteration is sequential and failures are isolated: a unit that fails is
/// recorded in the report and the scan moves on to the next unit.
pub async fn run_batch(client: &Client, config: &Config, targets: &[BatchTarget]) -> Report {
    let mut report = Report::default();

    for target in targets {
        let context = format!(
            "{}/{} workflow {:?} branch {:?}",
            config.source_owner, target.repo, target.workflow, target.branch
        );
        if let Err(error) = scan_target(client, config, target, &mut report).await {
            report.record(context, error);
        }
    }

    info!(
        "batch scan finished: {} published, {} failed",
        report.published(),
        report.failures().len()
    );
    report
}

async fn scan_target(
    client: &Client,
    config: &Config,
    target: &BatchTarget,
    report: &mut Report,
) -> RelayResult<()> {
    let owner = &config.source_owner;
    let workflows = client.list_workflows(owner, &target.repo).await?;
    let workflow = locator::workflow_by_name(workflows, &target.workflow).ok_or_else(|| {
        RelayError::WorkflowNotFound {
            owner: owner.clone(),
            repo: target.repo.clone(),
            name: target.workflow.clone(),
        }
    })?;

    let runs = client
        .list_runs(owner, &target.repo, workflow.id, Some(&target.branch))
        .await?;

    for run in runs {
        let run_context = format!("{owner}/{} run #{}", target.repo, run.run_number);

        if !config.branch_permitted(&run.head_branch) {
            report.record(
                run_context,
                RelayError::BranchNotPermitted {
                    run_number: run.run_number,
                    branch: run.head_branch.clone(),
                },
            );
            continue;
        }
        if run.status.as_deref() != Some(STATUS_COMPLETED) {
            continue;
        }

        let jobs = match client.list_jobs(owner, &target.repo, run.id).await {
            Ok(jobs) => jobs,
            Err(error) => {
                report.record(run_context, error);
                continue;
            }
        };

        for job in jobs.into_iter().filter(Job::is_completed) {
            if let Err(error) = scan_job(client, config, target, &run, &job, report).await {
                report.record(
                    format!("{run_context} job {:?}", job.name),
                    error,
                );
            }
        }
    }

    Ok(())
}

async fn scan_job(
    client: &Client,
    config: &Config,
    target: &BatchTarget,
    run: &WorkflowRun,
    job: &Job,
    report: &mut Report,
) -> RelayResult<()> {
    let owner = &config.source_owner;
    let log = client.download_job_log(owner, &target.repo, job.id).await?;

    for record in scanner::scan_log(&log) {
        let context = format!(
            "{owner}/{} run #{} job {:?} package {:?}",
            target.repo, run.run_number, job.name, record.name
        );

        let unit = async {
            let workdir = tempfile::tempdir()?;
            let payload =
                verifier::verify_artifact(client, owner, &target.repo, run.id, &record, workdir.path())
                    .await?;
            publisher::publish(config, &payload, workdir.path()).await
        };

        match unit.await {
            Ok(()) => report.count_published(),
            Err(error) => report.record(context, error),
        }
    }

    Ok(())
}
