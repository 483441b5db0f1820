//! Narrow interfaces to the systems jobs are launched on
//!
//! The submitters only talk to these traits, so the launch logic can be exercised against
//! in-memory fakes.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::{BackendError, TelemetryError};
use crate::submit::alarm::UtilizationAlarm;

/// EC2 and CloudWatch clients
pub mod ec2;

/// sbatch command line
pub mod sbatch;

/// Code snapshots uploaded to S3 before a batch is launched
pub mod s3;

/// A request for one VM running `init_payload` on boot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    pub launch_template: String,
    pub resource_type: String,
    pub init_payload: String,
    pub tags: BTreeMap<String, String>,
    pub dry_run: bool,
}

/// What the cloud did with an allocation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// A VM exists; the handle is its instance id
    Created(String),
    /// The request would have succeeded, nothing was allocated
    DryRun,
}

#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn allocate(&self, request: &AllocationRequest) -> Result<Allocation, BackendError>;

    /// Default number of vCPUs of an instance type
    async fn describe_resource_type(&self, resource_type: &str) -> Result<u32, TelemetryError>;

    async fn put_alarm(&self, alarm: &UtilizationAlarm) -> Result<(), TelemetryError>;
}

pub trait ClusterApi: Send + Sync {
    /// Queue a batch script, returning the scheduler's job id
    fn submit_batch_script(&self, path: &Path) -> Result<String, BackendError>;

    /// Check a batch script would be accepted without queueing it
    fn validate_batch_script(&self, path: &Path) -> Result<(), BackendError>;
}
