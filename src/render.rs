//! Render jobs into platform launch payloads

/// Options shared by every job of a batch
pub mod options;

/// Shell quoting and checks on text embedded in payloads
pub mod shell;

/// Structured job script: an ordered list of typed steps serialised to shell
pub mod script;

/// Wrap job scripts in cloud-init user-data or an sbatch script
pub mod payload;
