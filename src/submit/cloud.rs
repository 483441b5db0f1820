use async_trait::async_trait;
use log::{info, warn};

use crate::backend::{Allocation, AllocationRequest, CloudApi};
use crate::render::payload::RenderedPayload;
use crate::submit::alarm::attach_alarm;
use crate::submit::{SubmissionResult, SubmitRequest, Submitter};

/// Launches one self-terminating VM per job
pub struct CloudSubmitter<A> {
    pub api: A,
    pub launch_template: String,
    /// Attach a CPU utilisation floor alarm to every launched instance
    pub alarm: bool,
}

#[async_trait]
impl<A: CloudApi> Submitter for CloudSubmitter<A> {
    async fn submit(&self, payload: &RenderedPayload, request: &SubmitRequest) -> SubmissionResult {
        let name = &payload.job.name;
        let mut tags = request.tags.clone();
        tags.insert("Name".to_string(), name.clone());

        let allocation = AllocationRequest {
            launch_template: self.launch_template.clone(),
            resource_type: request.resource_type.clone(),
            init_payload: payload.text.clone(),
            tags,
            dry_run: request.dry_run,
        };

        info!("Requesting {} instance for {}", request.resource_type, name);
        match self.api.allocate(&allocation).await {
            Ok(Allocation::Created(instance_id)) => {
                info!("Launched {} as {}", name, instance_id);
                if self.alarm && !request.dry_run {
                    if let Err(err) = attach_alarm(&self.api, name, &instance_id, &request.resource_type).await {
                        warn!("{err}");
                    }
                }
                SubmissionResult::submitted(name, Some(instance_id))
            }
            Ok(Allocation::DryRun) => SubmissionResult::submitted(name, None),
            Err(err) => {
                warn!("Launch of {} failed: {}", name, err);
                SubmissionResult::failed(name, err)
            }
        }
    }
}
