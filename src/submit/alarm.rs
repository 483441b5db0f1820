use log::{info, warn};

use crate::backend::CloudApi;
use crate::error::TelemetryError;

/// Average CPU use, in cores, below which a job is considered stuck
const BUSY_CORES: f64 = 1.4;

/// Alarm raised when an instance stays below a CPU utilisation floor for ten minutes
///
/// Actions are disabled: the alarm only flags idle instances in the console, it never stops them.
#[derive(Debug, Clone, PartialEq)]
pub struct UtilizationAlarm {
    pub name: String,
    pub instance_id: String,
    pub threshold: f64,
    pub metric_name: &'static str,
    pub namespace: &'static str,
    pub statistic: &'static str,
    pub comparison_operator: &'static str,
    pub treat_missing_data: &'static str,
    pub period_seconds: i64,
    pub evaluation_periods: i64,
    pub datapoints_to_alarm: i64,
    pub actions_enabled: bool,
}

impl UtilizationAlarm {
    pub fn for_instance(job_name: &str, instance_id: &str, core_count: u32) -> UtilizationAlarm {
        UtilizationAlarm {
            name: format!("{job_name}_min_cpu_util"),
            instance_id: instance_id.to_string(),
            threshold: threshold(core_count),
            metric_name: "CPUUtilization",
            namespace: "AWS/EC2",
            statistic: "Average",
            comparison_operator: "LessThanThreshold",
            treat_missing_data: "missing",
            period_seconds: 300,
            evaluation_periods: 2,
            datapoints_to_alarm: 2,
            actions_enabled: false,
        }
    }

    pub fn description(&self) -> String {
        format!("Alarm when server CPU is below {}% for 10 minutes", self.threshold)
    }
}

/// Percentage of the instance's cores that corresponds to `BUSY_CORES`, rounded to 2 decimals
pub fn threshold(core_count: u32) -> f64 {
    let percent = BUSY_CORES / f64::from(core_count.max(1)) * 100.0;
    (percent * 100.0).round() / 100.0
}

/// Core count used when the instance type can't be described
pub fn fallback_core_count(resource_type: &str) -> u32 {
    match resource_type {
        "p2.xlarge" => 4,
        _ => 8,
    }
}

/// Create the utilisation alarm for a freshly launched instance
///
/// Never fails the submission: every problem is logged and returned for the caller to drop.
pub async fn attach_alarm<A: CloudApi + ?Sized>(
    api: &A,
    job_name: &str,
    instance_id: &str,
    resource_type: &str,
) -> Result<UtilizationAlarm, TelemetryError> {
    let core_count = match api.describe_resource_type(resource_type).await {
        Ok(cores) => cores,
        Err(err) => {
            let cores = fallback_core_count(resource_type);
            warn!("{err}");
            warn!("Using core count: {cores}");
            cores
        }
    };

    let alarm = UtilizationAlarm::for_instance(job_name, instance_id, core_count);
    api.put_alarm(&alarm).await?;
    info!("Created alarm {} at {}%", alarm.name, alarm.threshold);
    Ok(alarm)
}
