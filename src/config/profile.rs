use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::schema::{load_schema, validate};
use crate::error::ConfigError;
use crate::spec::job::JobSpec;

/// included default profile
static DEFAULT_PROFILE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/profiles/default.json"));

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Base s3:// path, per-project folders live below it
    pub remote_log_path: String,
    pub project: String,
    /// Log directory relative to the working directory, synced to S3 on failure
    pub log_directory: String,
    /// Append `--s3-path <remote_log_path>` to every sub-command
    #[serde(default)]
    pub forward_remote_path: bool,
    #[serde(default)]
    pub extra_flags: Vec<String>,
    #[serde(default = "default_pause_seconds")]
    pub default_pause_seconds: u64,
    #[serde(default)]
    pub snapshot_excludes: Vec<String>,
    pub cloud: CloudProfile,
    pub cluster: ClusterProfile,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudProfile {
    pub region: String,
    pub launch_template: String,
    /// Instance type used when `--resource-type` is not given
    pub resource_type: String,
    pub user: String,
    pub environment_name: String,
    pub working_directory: PathBuf,
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default = "default_session")]
    pub session: String,
    #[serde(default = "default_idle_minutes")]
    pub idle_minutes: u64,
    #[serde(default)]
    pub setup: Vec<String>,
    #[serde(default)]
    pub default_jobs: Vec<JobSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterProfile {
    pub environment_name: String,
    pub working_directory: PathBuf,
    #[serde(default)]
    pub executable: Option<String>,
    pub cpus: u32,
    pub memory: String,
    pub time: String,
    pub partition: String,
    pub output_directory: PathBuf,
    /// Local directory receiving the sbatch scripts and the job log
    #[serde(default = "default_script_directory")]
    pub script_directory: PathBuf,
    #[serde(default = "default_sbatch_program")]
    pub sbatch_program: PathBuf,
    #[serde(default)]
    pub idle_minutes: u64,
    #[serde(default)]
    pub default_jobs: Vec<JobSpec>,
}

fn default_pause_seconds() -> u64 { 5 }
fn default_session() -> String { "run".to_string() }
fn default_idle_minutes() -> u64 { 5 }
fn default_script_directory() -> PathBuf { PathBuf::from("sbatch") }
fn default_sbatch_program() -> PathBuf { PathBuf::from("sbatch") }

impl Profile {
    /// Load a profile from disk, or the built-in profile when no path is given
    pub fn load(path: Option<&Path>) -> Result<Profile, ConfigError> {
        let json_string = match path {
            Some(path) => read_file(path)?,
            None => {
                info!("No profile given, using built-in profile");
                DEFAULT_PROFILE.to_string()
            }
        };
        Profile::parse(&json_string)
    }

    pub fn parse(json_string: &str) -> Result<Profile, ConfigError> {
        info!("Parsing profile into untyped structure");
        let json: Value = serde_json::from_str(json_string)?;

        info!("Validating profile against JSON schema");
        let schema = load_schema()?;
        if let Err(err) = validate(&schema, &json) {
            warn!("Profile fails validation");
            return Err(err);
        }

        info!("Deserialising valid profile");
        Ok(serde_json::from_value::<Profile>(json)?)
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    info!("Reading profile at {}", path.display());
    fs::read_to_string(path).map_err(|source| {
        warn!("Can't read profile at path {}: {}", path.display(), source);
        ConfigError::ProfileRead { path: path.to_path_buf(), source }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn built_in_profile_is_valid() {
        let profile = Profile::load(None).unwrap();
        assert_eq!(profile.cloud.resource_type, "p2.xlarge");
        assert_eq!(profile.cloud.idle_minutes, 5);
        assert_eq!(profile.cluster.default_jobs.len(), 1);
        assert_eq!(profile.snapshot_excludes, vec!["*.py"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut json: Value = serde_json::from_str(DEFAULT_PROFILE).unwrap();
        json["cloud"]["instance_type"] = json!("p3.2xlarge");

        let err = Profile::parse(&json.to_string()).unwrap_err();
        match err {
            ConfigError::ProfileInvalid(messages) => assert!(messages.iter().any(|m| m.contains("instance_type"))),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn remote_path_must_be_s3() {
        let mut json: Value = serde_json::from_str(DEFAULT_PROFILE).unwrap();
        json["remote_log_path"] = json!("/local/logs");
        assert!(matches!(Profile::parse(&json.to_string()), Err(ConfigError::ProfileInvalid(_))));
    }

    #[test]
    fn working_directory_needing_quotes_is_rejected() {
        let mut json: Value = serde_json::from_str(DEFAULT_PROFILE).unwrap();
        json["cloud"]["working_directory"] = json!("/home/ubuntu/my run");
        assert!(matches!(Profile::parse(&json.to_string()), Err(ConfigError::ProfileInvalid(_))));
    }

    #[test]
    fn missing_section_is_rejected() {
        let mut json: Value = serde_json::from_str(DEFAULT_PROFILE).unwrap();
        json.as_object_mut().unwrap().remove("cluster");
        assert!(matches!(Profile::parse(&json.to_string()), Err(ConfigError::ProfileInvalid(_))));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(matches!(Profile::parse("{ not json"), Err(ConfigError::ProfileDecode(_))));
    }

    #[test]
    fn profile_file_is_read_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("profile.json");
        fs::write(&path, DEFAULT_PROFILE.replace("\"v3\"", "\"v4\"")).unwrap();

        let profile = Profile::load(Some(&path)).unwrap();
        assert_eq!(profile.project, "v4");

        let missing = dir.path().join("missing.json");
        assert!(matches!(Profile::load(Some(&missing)), Err(ConfigError::ProfileRead { .. })));
    }
}
