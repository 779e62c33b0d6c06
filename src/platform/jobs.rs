//! Asynchronous job polling
//!
//! Asynchronous creates and deletes answer with a job reference; callers
//! need a synchronous wait primitive before chaining the next operation
//! (a service key cannot be fetched until the instance create job has
//! completed). The poller GETs the job resource until it reaches a
//! terminal state or exhausts its attempt budget.

use std::time::Duration;

use tracing::debug;

use super::client::PlatformClient;
use super::models::Job;
use crate::constants::jobs;
use crate::errors::{PlatformError, PlatformResult};

/// Polling policy. Job completion for these resource operations is
/// typically sub-second to a few seconds, so the delay ramps gently
/// rather than exponentially.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed attempt budget
    pub max_attempts: u32,
    /// Unit of the delay ramp; attempt `n` (1-based) sleeps `(n-1)/2` units
    pub ramp_unit: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: jobs::MAX_POLL_ATTEMPTS,
            ramp_unit: jobs::POLL_RAMP_UNIT,
        }
    }
}

impl PollConfig {
    /// Same attempt budget with no delay between attempts
    pub fn immediate() -> Self {
        Self {
            ramp_unit: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay before the given 1-based attempt: 0,0,1,1,2,2,... units
    pub fn ramp_delay(&self, attempt: u32) -> Duration {
        self.ramp_unit * (attempt.saturating_sub(1) / 2)
    }
}

/// Poll the job at `url` until it reaches a terminal state.
///
/// `FAILED` terminates immediately with the job's first structured error
/// (falling back to the job guid); `COMPLETE` terminates successfully; any
/// other state is treated as not yet terminal. Exhausting the budget is the
/// distinct [`PlatformError::PollingExhausted`] error.
pub async fn poll_job(
    platform: &PlatformClient,
    url: &str,
    config: &PollConfig,
) -> PlatformResult<Job> {
    let mut last_state = String::new();

    for attempt in 1..=config.max_attempts {
        let delay = config.ramp_delay(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        debug!(
            "Getting job by URL: {url} (try {attempt}/{})",
            config.max_attempts
        );
        let job = platform.get_job(url).await?;

        if job.is_failed() {
            return Err(job_failure(&job));
        }
        if job.is_complete() {
            return Ok(job);
        }
        last_state = job.state;
    }

    Err(PlatformError::PollingExhausted {
        attempts: config.max_attempts,
        state: last_state,
    })
}

fn job_failure(job: &Job) -> PlatformError {
    match job.errors.first() {
        Some(message) => PlatformError::JobFailed {
            code: message.code,
            title: message.title.clone(),
            detail: message.detail.clone(),
        },
        None => PlatformError::JobFailedNoDetail {
            guid: job.guid.clone(),
        },
    }
}
