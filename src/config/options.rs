use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::config::profile::Profile;
use crate::error::ConfigError;
use crate::platform::Platform;
use crate::render::options::{ClusterResources, CloudHost, RenderOptions};
use crate::spec::load::DefaultBatch;

/// Replaced by the batch's project in profile paths
const PROJECT_PLACEHOLDER: &str = "{project}";

/// Command line values that take precedence over the profile
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub remote_log_path: Option<String>,
    pub project: Option<String>,
    pub resource_type: Option<String>,
    pub extra_flags: Vec<String>,
}

impl Profile {
    pub fn remote_log_path(&self, overrides: &Overrides) -> Result<Url, ConfigError> {
        let uri = overrides.remote_log_path.as_deref().unwrap_or(&self.remote_log_path);
        parse_remote(uri)
    }

    pub fn project<'a>(&'a self, overrides: &'a Overrides) -> &'a str {
        overrides.project.as_deref().unwrap_or(&self.project)
    }

    /// Substitute the project into a host path such as `/n/groups/lab/{project}/slurm`
    pub fn project_path(&self, path: &Path, overrides: &Overrides) -> Result<PathBuf, ConfigError> {
        let project = self.project(overrides);
        let plain = !project.is_empty() && project.chars().all(|c| c.is_ascii_alphanumeric() || "._-".contains(c));
        if !plain {
            return Err(ConfigError::InvalidProject(project.to_string()));
        }
        Ok(PathBuf::from(path.to_string_lossy().replace(PROJECT_PLACEHOLDER, project)))
    }

    /// Where a failed job's logs end up: `{remote}/{project}/{log_directory}/_failed_jobs/`
    pub fn failure_sync_target(&self, overrides: &Overrides) -> Result<Url, ConfigError> {
        let base = self.remote_log_path(overrides)?;
        let log_directory = self.log_directory.trim_matches('/');
        join_remote(&base, &format!("{}/{}/_failed_jobs/", self.project(overrides), log_directory))
    }

    /// Where code snapshots are uploaded before launching
    pub fn snapshot_target(&self, platform: Platform, overrides: &Overrides) -> Result<Url, ConfigError> {
        let base = self.remote_log_path(overrides)?;
        join_remote(&base, &format!("{}/{}", self.project(overrides), platform.snapshot_folder()))
    }

    /// Resource type for the batch: instance type on the cloud, GPU type on the cluster
    pub fn resource_type(&self, platform: Platform, overrides: &Overrides) -> Option<String> {
        match (&overrides.resource_type, platform) {
            (Some(resource_type), _) => Some(resource_type.clone()),
            (None, Platform::CloudVm) => Some(self.cloud.resource_type.clone()),
            (None, Platform::BatchCluster) => None,
        }
    }

    pub fn default_batch(&self, platform: Platform) -> DefaultBatch {
        let jobs = match platform {
            Platform::CloudVm => self.cloud.default_jobs.clone(),
            Platform::BatchCluster => self.cluster.default_jobs.clone(),
        };
        DefaultBatch { jobs, pause: Duration::from_secs(self.default_pause_seconds) }
    }

    /// Build the options shared by every job of the batch
    pub fn render_options(&self, platform: Platform, overrides: &Overrides) -> Result<RenderOptions, ConfigError> {
        let mut extra_flags = self.extra_flags.clone();
        if self.forward_remote_path {
            extra_flags.push("--s3-path".to_string());
            extra_flags.push(self.remote_log_path(overrides)?.as_str().trim_end_matches('/').to_string());
        }
        extra_flags.extend(overrides.extra_flags.iter().cloned());

        let (environment_name, working_directory, executable, idle_minutes) = match platform {
            Platform::CloudVm => (
                &self.cloud.environment_name,
                &self.cloud.working_directory,
                &self.cloud.executable,
                self.cloud.idle_minutes,
            ),
            Platform::BatchCluster => (
                &self.cluster.environment_name,
                &self.cluster.working_directory,
                &self.cluster.executable,
                self.cluster.idle_minutes,
            ),
        };

        Ok(RenderOptions {
            platform,
            environment_name: environment_name.clone(),
            working_directory: self.project_path(working_directory, overrides)?,
            failure_sync_target: Some(self.failure_sync_target(overrides)?),
            idle_timeout_seconds: idle_minutes * 60,
            extra_flags,
            executable: executable.clone(),
            log_directory: PathBuf::from(&self.log_directory),
            cloud: CloudHost {
                user: self.cloud.user.clone(),
                setup: self.cloud.setup.clone(),
                session: self.cloud.session.clone(),
            },
            cluster: ClusterResources {
                cpus: self.cluster.cpus,
                memory: self.cluster.memory.clone(),
                time: self.cluster.time.clone(),
                partition: self.cluster.partition.clone(),
                gpu_type: match platform {
                    Platform::BatchCluster => self.resource_type(platform, overrides),
                    Platform::CloudVm => None,
                },
                output_directory: self.project_path(&self.cluster.output_directory, overrides)?,
            },
        })
    }
}

fn parse_remote(uri: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::RemotePath { uri: uri.to_string(), reason: reason.to_string() };
    let url = Url::parse(uri).map_err(|err| invalid(&err.to_string()))?;
    if url.scheme() != "s3" {
        return Err(invalid("only s3:// paths are supported"));
    }
    match url.host_str() {
        Some(bucket) if !bucket.is_empty() => Ok(url),
        _ => Err(invalid("missing bucket")),
    }
}

fn join_remote(base: &Url, suffix: &str) -> Result<Url, ConfigError> {
    let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), suffix);
    parse_remote(&joined)
}
