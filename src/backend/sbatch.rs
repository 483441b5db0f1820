use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::info;

use crate::backend::ClusterApi;
use crate::error::BackendError;

/// Submit batch scripts by running sbatch
pub struct Sbatch {
    pub program: PathBuf,
}

impl Sbatch {
    fn run(&self, arguments: &[&str], script: &Path) -> Result<Output, BackendError> {
        let mut sbatch = Command::new(&self.program);
        let cmd = sbatch.args(arguments).arg(script);
        info!("Running sbatch process");
        info!("{:?}", &cmd);

        let output = cmd.output().map_err(|err| BackendError::Spawn {
            program: self.program.display().to_string(),
            reason: err.to_string(),
        })?;

        match output.status.success() {
            true => Ok(output),
            false => Err(BackendError::ExitStatus {
                program: self.program.display().to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

impl ClusterApi for Sbatch {
    fn submit_batch_script(&self, path: &Path) -> Result<String, BackendError> {
        let output = self.run(&["--parsable"], path)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_job_id(&stdout).ok_or(BackendError::MissingHandle)
    }

    fn validate_batch_script(&self, path: &Path) -> Result<(), BackendError> {
        // sbatch reports the estimate on stderr and queues nothing
        let output = self.run(&["--test-only"], path)?;
        info!("{}", String::from_utf8_lossy(&output.stderr).trim());
        Ok(())
    }
}

/// Job id from sbatch output: `12345`, `12345;cluster` (--parsable) or `Submitted batch job 12345`
pub fn parse_job_id(stdout: &str) -> Option<String> {
    let line = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last()?;
    let line = line.strip_prefix("Submitted batch job ").unwrap_or(line);
    let id = line.split(';').next()?.trim();
    match !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        true => Some(id.to_string()),
        false => None,
    }
}
