use std::{fs, io};
use std::path::{Path, PathBuf};

use log::info;

use crate::error::ConfigError;

/// Expand the spec arguments into a flat list of files, keeping argument order
///
/// A directory stands for every regular file directly inside it, sorted by name so repeated runs
/// launch jobs in the same order.
pub fn expand_spec_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries = get_spec_paths(path)
                .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
            entries.sort();
            info!("Found {} spec files in {}", entries.len(), path.display());
            files.extend(entries);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn get_spec_paths(dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
    let paths = fs::read_dir(dir)?
        .map(|res| res.map(|e| e.path()))
        .collect::<Result<Vec<PathBuf>, io::Error>>()?;
    Ok(paths.into_iter().filter(|p| p.is_file()).collect())
}
