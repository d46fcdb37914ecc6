//! Task status derived from the status of its Job.

use crate::crd::{ExecutionStatus, TaskStatus};
use crate::time::{rfc3339, to_utc};
use k8s_openapi::api::batch::v1::{Job, JobCondition};

const JOB_FAILED_CONDITION: &str = "Failed";

/// Status of the task backed by `job`
///
/// A Job without a start time is still starting. Success needs a completion
/// time and failure a `Failed` condition; a Job with neither is running.
#[must_use]
pub fn job_status(job: &Job) -> TaskStatus {
    let Some(status) = job.status.as_ref() else {
        return TaskStatus::default();
    };
    let Some(start_time) = status.start_time.as_ref().and_then(rfc3339) else {
        return TaskStatus::default();
    };

    if status.succeeded.unwrap_or_default() > 0 {
        if let Some(end_time) = status.completion_time.as_ref().and_then(rfc3339) {
            return TaskStatus {
                start_time: Some(start_time),
                end_time: Some(end_time),
                execution_status: ExecutionStatus::Succeeded,
            };
        }
    }

    if status.failed.unwrap_or_default() > 0 {
        if let Some(end_time) = last_failure_time(status.conditions.as_deref().unwrap_or_default()) {
            return TaskStatus {
                start_time: Some(start_time),
                end_time: Some(end_time),
                execution_status: ExecutionStatus::Failed,
            };
        }
    }

    TaskStatus {
        start_time: Some(start_time),
        end_time: None,
        execution_status: ExecutionStatus::Running,
    }
}

fn last_failure_time(conditions: &[JobCondition]) -> Option<String> {
    conditions
        .iter()
        .filter(|c| c.type_ == JOB_FAILED_CONDITION)
        .filter_map(|c| c.last_transition_time.as_ref())
        .filter_map(|t| to_utc(t).zip(rfc3339(t)))
        .max_by_key(|(instant, _)| *instant)
        .map(|(_, formatted)| formatted)
}
