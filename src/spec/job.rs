use serde::{Deserialize, Serialize};

/// One job of a batch
///
/// Created by the loader from a spec file (or from the profile's default jobs) and never modified
/// afterwards. `command` may hold several lines, each of which is run as a separate sub-command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobSpec {
    pub name: String,
    pub command: String,
    /// 0-based line of the spec file this job came from, when split by line
    #[serde(default)]
    pub source_line: Option<usize>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> JobSpec {
        JobSpec { name: name.into(), command: command.into(), source_line: None }
    }

    /// Lines of the command that actually run: blank lines and `#` comments are dropped
    pub fn sub_commands(&self) -> impl Iterator<Item = &str> {
        self.command
            .lines()
            .map(str::trim)
            .filter(|line| !is_skipped(line))
    }
}

/// Blank lines and comment lines never become jobs or sub-commands
pub fn is_skipped(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_commands_skip_comments_and_blanks() {
        let job = JobSpec::new("train", "  --lr 0.1 \n# later\n\n   \n--lr 0.2");
        let commands: Vec<&str> = job.sub_commands().collect();
        assert_eq!(commands, vec!["--lr 0.1", "--lr 0.2"]);
    }

    #[test]
    fn indented_comment_is_skipped() {
        assert!(is_skipped("   # --lr 0.3"));
        assert!(!is_skipped("--comment-free"));
    }
}
