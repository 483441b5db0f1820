use std::path::PathBuf;

use url::Url;

use crate::platform::Platform;

/// Everything the renderer needs besides the job itself
///
/// Built once per batch from the launch profile and the command line, then shared read-only by
/// all jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub platform: Platform,
    /// conda environment activated before any command runs
    pub environment_name: String,
    pub working_directory: PathBuf,
    /// Logs are synced here when any sub-command fails
    pub failure_sync_target: Option<Url>,
    /// Grace period between the last command and shutdown
    pub idle_timeout_seconds: u64,
    /// Appended, in order, to every sub-command
    pub extra_flags: Vec<String>,
    /// Program prefixed to every sub-command, when spec files only hold arguments
    pub executable: Option<String>,
    /// Log directory, relative to the working directory
    pub log_directory: PathBuf,
    pub cloud: CloudHost,
    pub cluster: ClusterResources,
}

impl RenderOptions {
    /// Absolute path of the log directory on the target host
    pub fn log_path(&self) -> PathBuf {
        self.working_directory.join(&self.log_directory)
    }
}

/// Host bootstrap for cloud VMs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudHost {
    /// Unprivileged user that owns and runs the job
    pub user: String,
    /// Shell lines run once as `user` before the job, e.g. cloning and installing the code
    pub setup: Vec<String>,
    /// tmux session hosting the job, so an operator can attach to it
    pub session: String,
}

/// Resources requested in the sbatch header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterResources {
    pub cpus: u32,
    pub memory: String,
    pub time: String,
    pub partition: String,
    /// GPU type, `None` for no preference
    pub gpu_type: Option<String>,
    /// Directory receiving the SLURM output files
    pub output_directory: PathBuf,
}

impl ClusterResources {
    /// Generic resource request for one GPU
    pub fn gres(&self) -> String {
        match &self.gpu_type {
            Some(gpu) => format!("gpu:{gpu}:1"),
            None => "gpu:1".to_string(),
        }
    }
}
