//! Waits for a job to reach its terminal status.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    error::{RelayError, RelayResult},
    github::Job,
};

/// Re-fetches a job at a fixed interval until its status is `completed`.
///
/// The interval is constant; there is no backoff. With `timeout` set, a job
/// that is still running once the deadline passes yields
/// [`RelayError::PollTimeout`]; without it the wait is unbounded.
///
/// # Errors
///
/// Returns [`RelayError::PollTimeout`] on a passed deadline, or the error of
/// a failed fetch.
pub async fn poll_until_complete<F, Fut>(
    mut job: Job,
    interval: Duration,
    timeout: Option<Duration>,
    mut fetch: F,
) -> RelayResult<Job>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RelayResult<Job>>,
{
    let started = Instant::now();

    while !job.is_completed() {
        if let Some(timeout) = timeout
            && started.elapsed() >= timeout
        {
            return Err(RelayError::PollTimeout {
                job: job.name,
                waited_secs: started.elapsed().as_secs(),
            });
        }

        debug!(
            "job {:?} status is {}, sleeping for {}s to give it a chance to finish",
            job.name,
            job.status,
            interval.as_secs()
        );
        tokio::time::sleep(interval).await;
        job = fetch().await?;
    }

    info!(
        "job {:?} completed with conclusion {:?}",
        job.name, job.conclusion
    );
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
    };

    fn job(status: &str) -> Job {
        Job {
            id: 7,
            name: String::from("pack"),
            status: status.to_owned(),
            conclusion: (status == "completed").then(|| String::from("success")),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn issues_one_fetch_per_transition() {
        let transitions = RefCell::new(VecDeque::from([job("in_progress"), job("completed")]));
        let fetches = Cell::new(0_u32);

        let completed = poll_until_complete(job("queued"), Duration::from_secs(10), None, || {
            fetches.set(fetches.get() + 1);
            let next = transitions.borrow_mut().pop_front().unwrap();
            async move { Ok(next) }
        })
        .await
        .unwrap();

        assert!(completed.is_completed());
        assert_eq!(fetches.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn already_completed_job_needs_no_fetch() {
        let completed = poll_until_complete(job("completed"), Duration::from_secs(10), None, || {
            async { panic!("no fetch expected") }
        })
        .await
        .unwrap();
        assert!(completed.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_yields_poll_timeout() {
        let err = poll_until_complete(
            job("queued"),
            Duration::from_secs(10),
            Some(Duration::from_secs(25)),
            || async { Ok(job("in_progress")) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RelayError::PollTimeout { ref job, .. } if job == "pack"));
    }
}
