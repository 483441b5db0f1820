use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use log::{info, warn};

use crate::backend::ClusterApi;
use crate::error::BackendError;
use crate::render::payload::RenderedPayload;
use crate::submit::joblog::JobLog;
use crate::submit::{SubmissionResult, SubmitRequest, Submitter};

/// Writes each payload to `{script_directory}/{name}.sh` and hands it to the cluster
pub struct ClusterSubmitter<C> {
    pub api: C,
    pub script_directory: PathBuf,
}

impl<C> ClusterSubmitter<C> {
    pub fn job_log(&self) -> JobLog {
        JobLog { path: self.script_directory.join("jobs.txt") }
    }

    fn write_payload(&self, payload: &RenderedPayload) -> Result<PathBuf, BackendError> {
        let io_error = |path: &PathBuf, err: std::io::Error| BackendError::Io {
            path: path.clone(),
            reason: err.to_string(),
        };
        fs::create_dir_all(&self.script_directory).map_err(|err| io_error(&self.script_directory, err))?;

        let path = self.script_directory.join(format!("{}.sh", payload.job.name));
        info!("Writing batch script to {}", path.display());
        fs::write(&path, &payload.text).map_err(|err| io_error(&path, err))?;
        Ok(path)
    }
}

#[async_trait]
impl<C: ClusterApi> Submitter for ClusterSubmitter<C> {
    async fn submit(&self, payload: &RenderedPayload, request: &SubmitRequest) -> SubmissionResult {
        let name = &payload.job.name;
        let path = match self.write_payload(payload) {
            Ok(path) => path,
            Err(err) => return SubmissionResult::failed(name, err),
        };

        if request.dry_run {
            return match self.api.validate_batch_script(&path) {
                Ok(()) => SubmissionResult::submitted(name, None),
                Err(err) => SubmissionResult::failed(name, err),
            };
        }

        match self.api.submit_batch_script(&path) {
            Ok(handle) => {
                info!("SLURM job id: {handle}");
                // already queued, a log failure is only reported
                if let Err(err) = self.job_log().append(&path, &handle) {
                    warn!("Can't record job {} in job log: {}", handle, err);
                }
                SubmissionResult::submitted(name, Some(handle))
            }
            Err(err) => {
                warn!("sbatch failed for {}: {}", name, err);
                SubmissionResult::failed(name, err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    use crate::spec::job::JobSpec;

    #[derive(Default)]
    struct FakeSlurm {
        reject: bool,
        submitted: Mutex<Vec<PathBuf>>,
        validated: Mutex<Vec<PathBuf>>,
    }

    impl ClusterApi for FakeSlurm {
        fn submit_batch_script(&self, path: &Path) -> Result<String, BackendError> {
            if self.reject {
                return Err(BackendError::ExitStatus {
                    program: "sbatch".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "invalid partition".to_string(),
                });
            }
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(path.to_path_buf());
            Ok(format!("{}", 1000 + submitted.len()))
        }

        fn validate_batch_script(&self, path: &Path) -> Result<(), BackendError> {
            self.validated.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    fn payload(name: &str) -> RenderedPayload {
        RenderedPayload { job: JobSpec::new(name, "--lr 0.1"), text: format!("#!/bin/bash\n#SBATCH -J {name}\n") }
    }

    fn request(dry_run: bool) -> SubmitRequest {
        SubmitRequest { dry_run, ..Default::default() }
    }

    #[tokio::test]
    async fn submission_writes_script_and_log_line() {
        let dir = TempDir::new().unwrap();
        let cluster = ClusterSubmitter { api: FakeSlurm::default(), script_directory: dir.path().join("sbatch") };

        let first = cluster.submit(&payload("sweep_0"), &request(false)).await;
        let second = cluster.submit(&payload("sweep_3"), &request(false)).await;

        assert_eq!(first.backend_handle.as_deref(), Some("1001"));
        assert_eq!(second.backend_handle.as_deref(), Some("1002"));
        let script = dir.path().join("sbatch/sweep_0.sh");
        assert_eq!(fs::read_to_string(&script).unwrap(), "#!/bin/bash\n#SBATCH -J sweep_0\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("sbatch/jobs.txt")).unwrap(),
            format!("{}\t1001\n{}\t1002\n", script.display(), dir.path().join("sbatch/sweep_3.sh").display())
        );
    }

    #[tokio::test]
    async fn dry_run_validates_without_queueing() {
        let dir = TempDir::new().unwrap();
        let cluster = ClusterSubmitter { api: FakeSlurm::default(), script_directory: dir.path().to_path_buf() };

        let result = cluster.submit(&payload("sweep_0"), &request(true)).await;

        assert_eq!(result, SubmissionResult::submitted("sweep_0", None));
        assert!(cluster.api.submitted.lock().unwrap().is_empty());
        assert_eq!(cluster.api.validated.lock().unwrap().len(), 1);
        assert!(!dir.path().join("jobs.txt").exists());
    }

    #[tokio::test]
    async fn rejected_script_is_not_logged() {
        let dir = TempDir::new().unwrap();
        let api = FakeSlurm { reject: true, ..Default::default() };
        let cluster = ClusterSubmitter { api, script_directory: dir.path().to_path_buf() };

        let result = cluster.submit(&payload("sweep_0"), &request(false)).await;

        assert!(matches!(result.error, Some(BackendError::ExitStatus { .. })));
        assert!(!dir.path().join("jobs.txt").exists());
    }
}
