use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::error::ConfigError;
use crate::spec::job::{is_skipped, JobSpec};
use crate::spec::read::expand_spec_paths;

/// Jobs launched when no spec file is given on the command line
///
/// Launching them is always preceded by `pause`, so an operator who forgot the spec files can
/// cancel with Ctrl-C before any instance starts billing.
#[derive(Debug, Clone)]
pub struct DefaultBatch {
    pub jobs: Vec<JobSpec>,
    pub pause: Duration,
}

/// Load every job of a batch before anything is submitted
///
/// Any unreadable file or duplicated job name fails the whole batch.
pub fn load(paths: &[PathBuf], split_lines: bool, default: Option<&DefaultBatch>) -> Result<Vec<JobSpec>, ConfigError> {
    let jobs = match (paths.is_empty(), default) {
        (true, Some(default)) if !default.jobs.is_empty() => {
            pause_before_default(default);
            default.jobs.clone()
        }
        (true, _) => return Err(ConfigError::NoJobs),
        (false, _) => read_spec_files(paths)?,
    };

    let jobs = match split_lines {
        true => jobs.iter().flat_map(split_job).collect(),
        false => jobs,
    };

    check_unique_names(&jobs)?;
    info!("Loaded {} jobs", jobs.len());
    Ok(jobs)
}

fn pause_before_default(default: &DefaultBatch) {
    println!("Usage: launchpad [spec file] [spec file] ...");
    println!(
        "Running {} default job(s) in {} seconds (Press Ctrl-C to cancel).",
        default.jobs.len(),
        default.pause.as_secs()
    );
    warn!("No spec files given, falling back to the profile's default jobs");
    thread::sleep(default.pause);
}

fn read_spec_files(paths: &[PathBuf]) -> Result<Vec<JobSpec>, ConfigError> {
    expand_spec_paths(paths)?
        .iter()
        .map(|path| read_spec_file(path))
        .collect()
}

fn read_spec_file(path: &Path) -> Result<JobSpec, ConfigError> {
    info!("Reading spec file {}", path.display());
    let content = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    Ok(JobSpec::new(base_name(path), content.trim()))
}

/// Job name for a spec file: its last path component without the final extension
fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One job per retained line, named after the line's position in the stripped file
fn split_job(job: &JobSpec) -> Vec<JobSpec> {
    job.command
        .trim()
        .lines()
        .enumerate()
        .filter(|(_, line)| !is_skipped(line))
        .map(|(i, line)| JobSpec {
            name: format!("{}_{}", job.name, i),
            command: line.trim().to_string(),
            source_line: Some(i),
        })
        .collect()
}

fn check_unique_names(jobs: &[JobSpec]) -> Result<(), ConfigError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for job in jobs {
        if !seen.insert(job.name.as_str()) {
            let origin = match job.source_line {
                Some(line) => format!("again at line {line}"),
                None => "again as a whole file".to_string(),
            };
            return Err(ConfigError::DuplicateName { name: job.name.clone(), origin });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn one_job_per_file_in_input_order() {
        let dir = TempDir::new().unwrap();
        let b = write(&dir, "beta.txt", "\n  --lr 0.2\n--epochs 3  \n\n");
        let a = write(&dir, "alpha.sh", "--lr 0.1");

        let jobs = load(&[b, a], false, None).unwrap();

        assert_eq!(jobs, vec![
            JobSpec::new("beta", "--lr 0.2\n--epochs 3"),
            JobSpec::new("alpha", "--lr 0.1"),
        ]);
    }

    #[test]
    fn split_lines_keeps_raw_line_index() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "jobs.txt", "--lr 0.1\n# comment\n\n--lr 0.2");

        let jobs = load(&[path], true, None).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name, "jobs_0");
        assert_eq!(jobs[0].command, "--lr 0.1");
        assert_eq!(jobs[0].source_line, Some(0));
        assert_eq!(jobs[1].name, "jobs_3");
        assert_eq!(jobs[1].command, "--lr 0.2");
    }

    #[test]
    fn split_lines_uses_raw_index_across_files() {
        let dir = TempDir::new().unwrap();
        let first = write(&dir, "first.txt", "# header\n--a 1\n--a 2\n");
        let second = write(&dir, "second.txt", "--b 1\n   \n  # --b 2\n--b 3");

        let jobs = load(&[first, second], true, None).unwrap();
        let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();

        assert_eq!(names, vec!["first_1", "first_2", "second_0", "second_3"]);
    }

    #[test]
    fn file_without_extension_keeps_full_name() {
        assert_eq!(base_name(Path::new("runs/sweep")), "sweep");
        assert_eq!(base_name(Path::new("runs/sweep.v2.txt")), "sweep.v2");
    }

    #[test]
    fn missing_file_fails_whole_batch() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "good.txt", "--lr 0.1");
        let missing = dir.path().join("missing.txt");

        let err = load(&[good, missing.clone()], false, None).unwrap_err();

        match err {
            ConfigError::Read { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn same_base_name_is_a_collision() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("other")).unwrap();
        let first = write(&dir, "sweep.txt", "--a 1");
        let second = write(&dir, "other/sweep.txt", "--a 2");

        let err = load(&[first, second], true, None).unwrap_err();

        assert!(matches!(err, ConfigError::DuplicateName { ref name, .. } if name == "sweep_0"));
    }

    #[test]
    fn default_batch_runs_after_pause() {
        let default = DefaultBatch {
            jobs: vec![JobSpec::new("smoke_a", "--seed 11"), JobSpec::new("smoke_b", "--seed 22")],
            pause: Duration::from_millis(20),
        };

        let started = Instant::now();
        let jobs = load(&[], false, Some(&default)).unwrap();

        assert!(started.elapsed() >= default.pause);
        assert_eq!(jobs, default.jobs);
    }

    #[test]
    fn no_paths_and_no_default_is_an_error() {
        assert!(matches!(load(&[], false, None), Err(ConfigError::NoJobs)));

        let empty = DefaultBatch { jobs: vec![], pause: Duration::ZERO };
        assert!(matches!(load(&[], false, Some(&empty)), Err(ConfigError::NoJobs)));
    }
}
