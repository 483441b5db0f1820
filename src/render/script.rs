use std::path::PathBuf;

use url::Url;

use crate::error::RenderError;
use crate::platform::Platform;
use crate::render::options::RenderOptions;
use crate::render::shell::{check_command, check_name, quote};
use crate::spec::job::JobSpec;

/// Appended to every sub-command so a failure is remembered without stopping the script
const STATUS_CAPTURE: &str = " || EXIT_STATUS=$?";

/// What the host does once the job is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Power the VM off; with shutdown behaviour `terminate` the instance is deleted
    PowerOff,
    /// Leave the batch script with the remembered status, releasing the allocation
    Exit,
}

/// One step of a job script, in execution order
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    ActivateEnvironment(String),
    ChangeDirectory(PathBuf),
    ResetStatus,
    /// A sub-command; its non-zero exit status is recorded and the next step still runs
    Run(String),
    SyncLogsOnFailure { log_directory: PathBuf, target: Url },
    IdleThenTerminate { seconds: u64, action: Termination },
}

impl Step {
    fn write(&self, out: &mut Vec<String>) {
        match self {
            Step::ActivateEnvironment(name) => out.push(format!("source activate {}", quote(name))),
            Step::ChangeDirectory(path) => out.push(format!("cd {}", quote(&path.to_string_lossy()))),
            Step::ResetStatus => out.push("EXIT_STATUS=0".to_string()),
            Step::Run(command) => out.push(format!("{command}{STATUS_CAPTURE}")),
            Step::SyncLogsOnFailure { log_directory, target } => {
                let local = format!("{}/", log_directory.to_string_lossy().trim_end_matches('/'));
                out.push("if [ $EXIT_STATUS -ne 0 ]; then".to_string());
                out.push("    echo \"Error detected. Syncing all logs to S3.\"".to_string());
                out.push(format!("    aws s3 sync {} {}", quote(&local), quote(target.as_str())));
                out.push("fi".to_string());
            }
            Step::IdleThenTerminate { seconds, action: Termination::PowerOff } => {
                out.push(format!("echo \"Shutting down in {seconds} seconds, press Ctrl-C to interrupt.\""));
                // interrupting the sleep skips the poweroff
                out.push(format!("sleep {seconds} && sudo poweroff"));
            }
            Step::IdleThenTerminate { seconds, action: Termination::Exit } => {
                if *seconds > 0 {
                    out.push(format!("echo \"Releasing allocation in {seconds} seconds.\""));
                    out.push(format!("sleep {seconds}"));
                }
                out.push("exit $EXIT_STATUS".to_string());
            }
        }
    }
}

/// The script that runs a job on its host
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    /// Build the steps for a job, checking everything that ends up in the payload
    pub fn for_job(job: &JobSpec, options: &RenderOptions) -> Result<Script, RenderError> {
        check_name(&job.name)?;

        let mut steps = vec![
            Step::ActivateEnvironment(options.environment_name.clone()),
            Step::ChangeDirectory(options.working_directory.clone()),
            Step::ResetStatus,
        ];

        for line in job.sub_commands() {
            check_command(&job.name, line)?;
            steps.push(Step::Run(sub_command(line, options)));
        }

        if let Some(target) = &options.failure_sync_target {
            steps.push(Step::SyncLogsOnFailure { log_directory: options.log_path(), target: target.clone() });
        }

        let action = match options.platform {
            Platform::CloudVm => Termination::PowerOff,
            Platform::BatchCluster => Termination::Exit,
        };
        steps.push(Step::IdleThenTerminate { seconds: options.idle_timeout_seconds, action });

        Ok(Script { steps })
    }

    /// Sub-commands in the order they run
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|step| match step {
            Step::Run(command) => Some(command.as_str()),
            _ => None,
        })
    }

    /// Serialise to shell, one line per statement, without a shebang
    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        for step in &self.steps {
            step.write(&mut lines);
        }
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

fn sub_command(line: &str, options: &RenderOptions) -> String {
    let mut words: Vec<String> = Vec::with_capacity(options.extra_flags.len() + 2);
    if let Some(executable) = &options.executable {
        words.push(executable.clone());
    }
    words.push(line.to_string());
    words.extend(options.extra_flags.iter().map(|flag| quote(flag)));
    words.join(" ")
}

/// Recover the sub-commands embedded in a rendered payload, in order
pub fn parse_commands(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_suffix(STATUS_CAPTURE))
        .map(str::to_string)
        .collect()
}
