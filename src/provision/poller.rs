//! Drives a zone operation to completion.
//!
//! ```text
//! SUBMITTED -> {PENDING, RUNNING}* -> DONE (no errors) | DONE (errors)
//! ```
//!
//! Each iteration sleeps for the poll interval and then fetches a fresh
//! snapshot of the operation. Statuses outside the known set end the run.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::ProvisionError;
use crate::gcp::gce::{ComputeApi, Operation, OperationErrorItem, OperationStatus};

/// Waits between polls. Swapped out in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

/// What one operation snapshot means for the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// PENDING or RUNNING.
    Wait,
    Succeeded,
    Failed(Vec<OperationErrorItem>),
    Unknown(String),
}

impl PollStep {
    pub fn of(op: &Operation) -> PollStep {
        match &op.status {
            OperationStatus::Pending | OperationStatus::Running => PollStep::Wait,
            OperationStatus::Done if op.errors().is_empty() => PollStep::Succeeded,
            OperationStatus::Done => PollStep::Failed(op.errors().to_vec()),
            OperationStatus::Unrecognized(s) => PollStep::Unknown(s.clone()),
        }
    }
}

pub struct OperationPoller<'a> {
    api: &'a dyn ComputeApi,
    sleeper: &'a dyn Sleeper,
    project: &'a str,
    zone: &'a str,
    interval: Duration,
    timeout: Option<Duration>,
}

impl<'a> OperationPoller<'a> {
    pub fn new(
        api: &'a dyn ComputeApi,
        sleeper: &'a dyn Sleeper,
        project: &'a str,
        zone: &'a str,
        interval: Duration,
    ) -> Self {
        OperationPoller {
            api,
            sleeper,
            project,
            zone,
            interval,
            timeout: None,
        }
    }

    /// Gives up once this much time has been spent sleeping between polls.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Polls `operation` until it is DONE.
    ///
    /// Returns the final snapshot on success. Every error of a failed
    /// operation is logged before [`ProvisionError::Operation`] is returned.
    pub async fn wait(&self, operation: &str) -> Result<Operation, ProvisionError> {
        let mut waited = Duration::ZERO;
        loop {
            if let Some(limit) = self.timeout
                && waited >= limit
            {
                return Err(ProvisionError::OperationTimeout {
                    operation: operation.to_string(),
                    waited,
                });
            }
            self.sleeper.sleep(self.interval).await;
            waited += self.interval;

            let op = self
                .api
                .get_zone_operation(self.project, self.zone, operation)
                .await
                .map_err(|source| ProvisionError::OperationFetch {
                    operation: operation.to_string(),
                    source,
                })?;

            match PollStep::of(&op) {
                PollStep::Wait => {
                    info!(operation = %operation, status = %op.status, "waiting on operation");
                }
                PollStep::Succeeded => {
                    info!(operation = %operation, "operation succeeded");
                    return Ok(op);
                }
                PollStep::Failed(errors) => {
                    for e in &errors {
                        error!(
                            operation = %operation,
                            code = %e.code,
                            location = e.location.as_deref().unwrap_or(""),
                            message = %e.message,
                            "operation error"
                        );
                    }
                    return Err(ProvisionError::Operation {
                        operation: operation.to_string(),
                        errors,
                    });
                }
                PollStep::Unknown(status) => {
                    return Err(ProvisionError::UnknownOperationState {
                        operation: operation.to_string(),
                        status,
                    });
                }
            }
        }
    }
}
