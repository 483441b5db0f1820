//! Submit rendered payloads to a backend, one call per job
//!
//! A submitter never fails the batch: backend errors are recorded in the job's
//! [`SubmissionResult`] and the caller moves on to the next job.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::render::payload::RenderedPayload;

/// CPU utilisation floor alarms for launched VMs
pub mod alarm;

/// Append-only log of submitted cluster jobs
pub mod joblog;

/// Launch one VM per job
pub mod cloud;

/// Queue one sbatch job per job
pub mod cluster;

/// Per-batch submission settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Instance type on the cloud; informational on the cluster, where the GPU type is rendered
    pub resource_type: String,
    pub dry_run: bool,
    /// Extra tags; the job name is always added as `Name`
    pub tags: BTreeMap<String, String>,
}

/// Outcome of one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub job_name: String,
    pub backend_handle: Option<String>,
    pub error: Option<BackendError>,
}

impl SubmissionResult {
    pub fn submitted(job_name: &str, backend_handle: Option<String>) -> SubmissionResult {
        SubmissionResult { job_name: job_name.to_string(), backend_handle, error: None }
    }

    pub fn failed(job_name: &str, error: BackendError) -> SubmissionResult {
        SubmissionResult { job_name: job_name.to_string(), backend_handle: None, error: Some(error) }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, payload: &RenderedPayload, request: &SubmitRequest) -> SubmissionResult;
}
