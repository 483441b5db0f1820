//! Error taxonomy shared by every stage of a launch
//!
//! Only [`BackendError`] is recoverable at the batch level: it is recorded against a single job
//! and the next job is attempted. [`ConfigError`] and [`RenderError`] abort the batch before
//! anything is submitted. [`TelemetryError`] is logged and dropped.

use std::path::PathBuf;

/// Problems with spec files, the launch profile or the command line
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("can't read spec file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("job name {name} is defined twice ({origin})")]
    DuplicateName { name: String, origin: String },

    #[error("no spec files given and the profile defines no default jobs")]
    NoJobs,

    #[error("can't read profile {path}: {source}")]
    ProfileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("profile is not valid JSON: {0}")]
    ProfileDecode(#[from] serde_json::Error),

    #[error("profile fails validation: {}", .0.join("; "))]
    ProfileInvalid(Vec<String>),

    #[error("project name {0:?} must only contain letters, digits, '.', '_' and '-'")]
    InvalidProject(String),

    #[error("invalid remote path {uri}: {reason}")]
    RemotePath { uri: String, reason: String },

    #[error("invalid exclude pattern: {0}")]
    Exclude(#[from] globset::Error),

    #[error("can't set up AWS client: {0}")]
    Client(String),
}

/// A job can't be embedded safely in a launch payload
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("job name {0:?} must be non-empty and contain no whitespace, '/' or control characters")]
    UnsafeName(String),

    #[error("command for job {job} contains a control character: {command:?}")]
    ControlCharacter { job: String, command: String },

    #[error("command for job {job} collides with the payload delimiter {delimiter}")]
    Delimiter { job: String, delimiter: String },

    #[error("command for job {job} is not a complete shell statement, {reason}: {command:?}")]
    ShellSyntax { job: String, command: String, reason: &'static str },

    #[error("path {0:?} must only contain letters, digits and -_./=:,+@%")]
    UnsafePath(String),

    #[error("template {name} failed to render: {reason}")]
    Template { name: &'static str, reason: String },
}

/// The backend refused or failed a submission
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("allocation rejected: {0}")]
    Rejected(String),

    #[error("backend returned no handle for the submission")]
    MissingHandle,

    #[error("{program} exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("can't run {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("can't write {path}: {reason}")]
    Io { path: PathBuf, reason: String },
}

/// Best-effort monitoring failed
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("can't describe resource type {resource_type}: {reason}")]
    Describe { resource_type: String, reason: String },

    #[error("can't create alarm {name}: {reason}")]
    Alarm { name: String, reason: String },
}
