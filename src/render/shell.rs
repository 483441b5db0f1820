use std::path::Path;

use crate::error::RenderError;

/// Heredoc delimiter used to embed the job script in cloud-init user-data
pub const RUN_SCRIPT_DELIMITER: &str = "LAUNCHPAD_RUN_SCRIPT";

/// Heredoc delimiter used to feed setup lines to the job user's shell
pub const SETUP_DELIMITER: &str = "LAUNCHPAD_SETUP";

fn is_plain(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c))
}

/// Quote a single word for a POSIX shell, leaving plain words untouched
pub fn quote(word: &str) -> String {
    match is_plain(word) {
        true => word.to_string(),
        false => format!("'{}'", word.replace('\'', r"'\''")),
    }
}

/// Host paths spliced into nested shell strings must not need quoting
pub fn check_path(path: &Path) -> Result<(), RenderError> {
    let text = path.to_string_lossy();
    match is_plain(&text) {
        true => Ok(()),
        false => Err(RenderError::UnsafePath(text.into_owned())),
    }
}

/// Job names end up in file names and sbatch options
pub fn check_name(name: &str) -> Result<(), RenderError> {
    let unsafe_char = |c: char| c.is_whitespace() || c.is_control() || c == '/' || c == '\'' || c == '"';
    match name.is_empty() || name.chars().any(unsafe_char) {
        true => Err(RenderError::UnsafeName(name.to_string())),
        false => Ok(()),
    }
}

/// A sub-command is one line of shell and must not terminate any heredoc it is embedded in
///
/// It must also stay a complete simple statement, so that flags and the status capture appended
/// after it still take effect.
pub fn check_command(job: &str, command: &str) -> Result<(), RenderError> {
    if command.chars().any(|c| c.is_control() && c != '\t') {
        return Err(RenderError::ControlCharacter { job: job.to_string(), command: command.to_string() });
    }
    for delimiter in [RUN_SCRIPT_DELIMITER, SETUP_DELIMITER] {
        if command.trim() == delimiter {
            return Err(RenderError::Delimiter { job: job.to_string(), delimiter: delimiter.to_string() });
        }
    }
    shell_shape(command).map_err(|reason| RenderError::ShellSyntax {
        job: job.to_string(),
        command: command.to_string(),
        reason,
    })
}

/// Scan one line the way the shell tokenizer would, looking for anything that swallows what follows it
fn shell_shape(command: &str) -> Result<(), &'static str> {
    let mut quoted: Option<char> = None;
    let mut escaped = false;
    let mut word_start = true;

    for c in command.chars() {
        if escaped {
            escaped = false;
            word_start = false;
            continue;
        }
        match (quoted, c) {
            (Some('\''), '\'') => quoted = None,
            (Some('\''), _) => {}
            (Some(_), '\\') => escaped = true,
            (Some(_), '"') => quoted = None,
            (Some(_), _) => {}
            (None, '\\') => escaped = true,
            (None, '\'' | '"') => quoted = Some(c),
            (None, '#') if word_start => return Err("an unquoted '#' comments out the rest of the line"),
            (None, _) => {}
        }
        word_start = quoted.is_none() && !escaped && (c.is_whitespace() || ";&|()<>".contains(c));
    }

    if escaped {
        return Err("a trailing backslash joins the line with the next one");
    }
    if quoted.is_some() {
        return Err("a quote is never closed");
    }
    match command.trim_end().chars().last() {
        Some(';' | '&' | '|') => Err("a trailing control operator leaves the statement open"),
        _ => Ok(()),
    }
}
