use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::info;

/// Tab separated log of submitted batch scripts and their scheduler job ids
///
/// | payload file        | job id   |
/// | ------------------- | -------- |
/// | sbatch/sweep_0.sh   | 31234567 |
///
/// (no header is present in the output file). Lines are only ever appended.
pub struct JobLog {
    pub path: PathBuf,
}

impl JobLog {
    pub fn append(&self, payload_file: &Path, handle: &str) -> Result<(), io::Error> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = format!("{}\t{}\n", payload_file.display(), handle);
        file.write_all(line.as_bytes())?;
        info!("Recorded job {} in {}", handle, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn lines_are_appended() {
        let dir = TempDir::new().unwrap();
        let log = JobLog { path: dir.path().join("jobs.txt") };
        fs::write(&log.path, "sbatch/old.sh\t1\n").unwrap();

        log.append(Path::new("sbatch/a_0.sh"), "2").unwrap();
        log.append(Path::new("sbatch/a_1.sh"), "3").unwrap();

        assert_eq!(
            fs::read_to_string(&log.path).unwrap(),
            "sbatch/old.sh\t1\nsbatch/a_0.sh\t2\nsbatch/a_1.sh\t3\n"
        );
    }
}
