//! Turn run specification files into an ordered list of jobs

/// A single job: a name and the command line(s) it runs
pub mod job;

/// Expand spec file arguments into readable file paths
pub mod read;

/// Read spec files, optionally one job per line, and check job names
pub mod load;
