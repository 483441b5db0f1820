use std::str::FromStr;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{info, warn};
use rusoto_cloudwatch::{CloudWatch, CloudWatchClient, Dimension, PutMetricAlarmInput};
use rusoto_core::request::HttpClient;
use rusoto_core::{Region, RusotoError};
use rusoto_credential::DefaultCredentialsProvider;
use rusoto_ec2::{
    DescribeInstanceTypesRequest, Ec2, Ec2Client, LaunchTemplateSpecification, RunInstancesRequest, Tag,
    TagSpecification,
};

use crate::backend::{Allocation, AllocationRequest, CloudApi};
use crate::error::{BackendError, ConfigError, TelemetryError};
use crate::submit::alarm::UtilizationAlarm;

/// Resources tagged with the job name, so volumes can be traced back to their job
static TAGGED_RESOURCES: [&str; 2] = ["instance", "volume"];

pub struct Ec2Api {
    ec2: Ec2Client,
    cloudwatch: CloudWatchClient,
}

impl Ec2Api {
    pub fn new(region: &str) -> Result<Ec2Api, ConfigError> {
        let region = Region::from_str(region).map_err(|err| ConfigError::Client(err.to_string()))?;
        info!("Connecting to EC2 and CloudWatch in {}", region.name());

        let ec2 = Ec2Client::new_with(http_client()?, credentials()?, region.clone());
        let cloudwatch = CloudWatchClient::new_with(http_client()?, credentials()?, region);
        Ok(Ec2Api { ec2, cloudwatch })
    }
}

fn http_client() -> Result<HttpClient, ConfigError> {
    HttpClient::new().map_err(|err| ConfigError::Client(err.to_string()))
}

fn credentials() -> Result<DefaultCredentialsProvider, ConfigError> {
    DefaultCredentialsProvider::new().map_err(|err| ConfigError::Client(err.to_string()))
}

#[async_trait]
impl CloudApi for Ec2Api {
    async fn allocate(&self, request: &AllocationRequest) -> Result<Allocation, BackendError> {
        let tags: Vec<Tag> = request
            .tags
            .iter()
            .map(|(key, value)| Tag { key: Some(key.clone()), value: Some(value.clone()) })
            .collect();
        let tag_specifications: Vec<TagSpecification> = TAGGED_RESOURCES
            .iter()
            .map(|resource| TagSpecification {
                resource_type: Some(resource.to_string()),
                tags: Some(tags.clone()),
            })
            .collect();

        let run = RunInstancesRequest {
            launch_template: Some(LaunchTemplateSpecification {
                launch_template_name: Some(request.launch_template.clone()),
                ..Default::default()
            }),
            instance_type: Some(request.resource_type.clone()),
            // EC2 expects user data base64 encoded
            user_data: Some(STANDARD.encode(&request.init_payload)),
            tag_specifications: Some(tag_specifications),
            instance_initiated_shutdown_behavior: Some("terminate".to_string()),
            min_count: 1,
            max_count: 1,
            dry_run: Some(request.dry_run),
            ..Default::default()
        };

        match self.ec2.run_instances(run).await {
            Ok(reservation) => reservation
                .instances
                .and_then(|instances| instances.into_iter().next())
                .and_then(|instance| instance.instance_id)
                .map(Allocation::Created)
                .ok_or(BackendError::MissingHandle),
            Err(err) => {
                let message = error_message(err);
                if request.dry_run && message.contains("DryRunOperation") {
                    info!("Dry run succeeded, no instance launched");
                    Ok(Allocation::DryRun)
                } else {
                    Err(BackendError::Rejected(message))
                }
            }
        }
    }

    async fn describe_resource_type(&self, resource_type: &str) -> Result<u32, TelemetryError> {
        let describe_error = |reason: String| TelemetryError::Describe {
            resource_type: resource_type.to_string(),
            reason,
        };
        let request = DescribeInstanceTypesRequest {
            instance_types: Some(vec![resource_type.to_string()]),
            ..Default::default()
        };
        let response = self
            .ec2
            .describe_instance_types(request)
            .await
            .map_err(|err| describe_error(error_message(err)))?;

        response
            .instance_types
            .and_then(|types| types.into_iter().next())
            .and_then(|info| info.v_cpu_info)
            .and_then(|cpu| cpu.default_v_cpus)
            .and_then(|cores| u32::try_from(cores).ok())
            .ok_or_else(|| describe_error("no vCPU information returned".to_string()))
    }

    async fn put_alarm(&self, alarm: &UtilizationAlarm) -> Result<(), TelemetryError> {
        let input = PutMetricAlarmInput {
            alarm_name: alarm.name.clone(),
            metric_name: Some(alarm.metric_name.to_string()),
            namespace: Some(alarm.namespace.to_string()),
            period: Some(alarm.period_seconds),
            statistic: Some(alarm.statistic.to_string()),
            evaluation_periods: alarm.evaluation_periods,
            datapoints_to_alarm: Some(alarm.datapoints_to_alarm),
            comparison_operator: alarm.comparison_operator.to_string(),
            threshold: Some(alarm.threshold),
            treat_missing_data: Some(alarm.treat_missing_data.to_string()),
            actions_enabled: Some(alarm.actions_enabled),
            alarm_description: Some(alarm.description()),
            dimensions: Some(vec![Dimension {
                name: "InstanceId".to_string(),
                value: alarm.instance_id.clone(),
            }]),
            ..Default::default()
        };

        self.cloudwatch.put_metric_alarm(input).await.map_err(|err| {
            warn!("Can't create alarm {}", alarm.name);
            TelemetryError::Alarm { name: alarm.name.clone(), reason: error_message(err) }
        })
    }
}

/// EC2 reports service errors as unparsed XML, which carries the useful error code
fn error_message<E: std::error::Error + 'static>(err: RusotoError<E>) -> String {
    match err {
        RusotoError::Unknown(response) => String::from_utf8_lossy(&response.body).into_owned(),
        other => other.to_string(),
    }
}
