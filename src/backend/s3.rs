use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use globset::{Glob, GlobSet, GlobSetBuilder};
use log::info;
use rusoto_core::request::HttpClient;
use rusoto_core::Region;
use rusoto_credential::DefaultCredentialsProvider;
use rusoto_s3::{PutObjectRequest, S3Client, S3};
use url::Url;
use walkdir::WalkDir;

use crate::error::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("can't walk {0}")]
    Walk(#[from] walkdir::Error),

    #[error("can't read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload of s3://{bucket}/{key} failed: {reason}")]
    Upload { bucket: String, key: String, reason: String },
}

/// A local file and the object key it is uploaded to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub path: PathBuf,
    pub key: String,
}

/// Compile exclude patterns; each is matched against relative paths and bare file names
pub fn build_excludes(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Split an s3:// url into bucket and key prefix (without leading slash)
pub fn bucket_and_prefix(remote: &Url) -> (String, String) {
    let bucket = remote.host_str().unwrap_or_default().to_string();
    let prefix = remote.path().trim_start_matches('/').to_string();
    (bucket, prefix)
}

/// Every file below `local_dir` that isn't excluded, in a stable order
pub fn collect_uploads(local_dir: &Path, prefix: &str, excludes: &GlobSet) -> Result<Vec<Upload>, SyncError> {
    let mut uploads = Vec::new();
    for entry in WalkDir::new(local_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(local_dir).unwrap_or(entry.path());
        if excludes.is_match(relative) || excludes.is_match(entry.file_name()) {
            continue;
        }
        let relative_key: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let key = match prefix.is_empty() {
            true => relative_key.join("/"),
            false => format!("{}/{}", prefix.trim_end_matches('/'), relative_key.join("/")),
        };
        uploads.push(Upload { path: entry.path().to_path_buf(), key });
    }
    Ok(uploads)
}

/// One-way sync of a local directory to object storage
pub struct S3Sync {
    client: S3Client,
}

impl S3Sync {
    pub fn new(region: &str) -> Result<S3Sync, ConfigError> {
        let region = Region::from_str(region).map_err(|err| ConfigError::Client(err.to_string()))?;
        let http = HttpClient::new().map_err(|err| ConfigError::Client(err.to_string()))?;
        let credentials = DefaultCredentialsProvider::new().map_err(|err| ConfigError::Client(err.to_string()))?;
        Ok(S3Sync { client: S3Client::new_with(http, credentials, region) })
    }

    /// Upload every non-excluded file, returning how many were uploaded
    pub async fn sync(&self, local_dir: &Path, remote: &Url, excludes: &GlobSet) -> Result<usize, SyncError> {
        let (bucket, prefix) = bucket_and_prefix(remote);
        let uploads = collect_uploads(local_dir, &prefix, excludes)?;
        info!("Syncing {} files from {} to {}", uploads.len(), local_dir.display(), remote);

        for upload in &uploads {
            let body = fs::read(&upload.path)
                .map_err(|source| SyncError::Read { path: upload.path.clone(), source })?;
            let request = PutObjectRequest {
                bucket: bucket.clone(),
                key: upload.key.clone(),
                body: Some(body.into()),
                ..Default::default()
            };
            self.client.put_object(request).await.map_err(|err| SyncError::Upload {
                bucket: bucket.clone(),
                key: upload.key.clone(),
                reason: err.to_string(),
            })?;
            info!("Uploaded s3://{}/{}", bucket, upload.key);
        }
        Ok(uploads.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn excluded_files_are_not_uploaded() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("aws/nested")).unwrap();
        fs::write(dir.path().join("aws/run_a.txt"), "--lr 0.1").unwrap();
        fs::write(dir.path().join("aws/launch.py"), "print()").unwrap();
        fs::write(dir.path().join("aws/nested/run_b.txt"), "--lr 0.2").unwrap();
        fs::write(dir.path().join("aws/nested/helper.py"), "").unwrap();

        let excludes = build_excludes(&["*.py".to_string()]).unwrap();
        let uploads = collect_uploads(&dir.path().join("aws"), "v3/scheduling/aws/", &excludes).unwrap();
        let keys: Vec<&str> = uploads.iter().map(|u| u.key.as_str()).collect();

        assert_eq!(keys, vec!["v3/scheduling/aws/nested/run_b.txt", "v3/scheduling/aws/run_a.txt"]);
    }

    #[test]
    fn bucket_is_the_url_host() {
        let url = Url::parse("s3://markslab-private/seqdesign/v3/scheduling/aws/").unwrap();
        assert_eq!(
            bucket_and_prefix(&url),
            ("markslab-private".to_string(), "seqdesign/v3/scheduling/aws/".to_string())
        );
    }

    #[test]
    fn bad_pattern_is_a_config_error() {
        assert!(matches!(build_excludes(&["a[".to_string()]), Err(ConfigError::Exclude(_))));
    }
}
