use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use log::{info, warn};

use crate::backend::ec2::Ec2Api;
use crate::backend::s3::{build_excludes, S3Sync};
use crate::backend::sbatch::Sbatch;
use crate::batch::BatchReport;
use crate::config::options::Overrides;
use crate::config::profile::Profile;
use crate::platform::Platform;
use crate::render::payload::render_all;
use crate::spec::load::load;
use crate::submit::cloud::CloudSubmitter;
use crate::submit::cluster::ClusterSubmitter;
use crate::submit::SubmitRequest;

mod backend;
mod batch;
mod config;
mod error;
mod platform;
mod render;
mod spec;
mod submit;

#[derive(Parser, Debug)]
#[command(name = "launchpad")]
#[command(version = "0.1.0")]
#[command(about = "Launch training jobs on EC2 instances or a SLURM cluster")]
#[command(long_about = "Every spec file (or every line of it, with --split-lines) becomes one job. \
With no spec files the profile's default jobs are launched after a short, cancellable pause.")]
struct Args {
    /// Spec files (or directories of spec files) with the command line of each job
    specs: Vec<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Platform::CloudVm)]
    platform: Platform,

    /// JSON launch profile, defaults to the built-in profile
    #[arg(long)]
    profile: Option<PathBuf>,

    /// EC2 instance type, or GPU type on the cluster (no preference when omitted)
    #[arg(long, value_name = "TYPE")]
    resource_type: Option<String>,

    /// Launch every line of a spec file as a separate job (always on for the cluster)
    #[arg(long)]
    split_lines: bool,

    /// Validate every submission without launching anything
    #[arg(long)]
    dry_run: bool,

    /// Add a minimum CPU utilisation alarm to each instance (cloud only)
    #[arg(long)]
    alarm: bool,

    /// Base s3:// path for logs and snapshots
    #[arg(long, value_name = "URI")]
    remote_log_path: Option<String>,

    /// Project name, a subfolder of the remote log path
    #[arg(long)]
    project: Option<String>,

    /// Flag appended to every command, may be repeated
    #[arg(long = "extra-flag", value_name = "FLAG", allow_hyphen_values = true)]
    extra_flags: Vec<String>,

    /// Upload this directory to the project's scheduling folder before launching
    #[arg(long, value_name = "DIR")]
    snapshot_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    info!("launchpad starting up");

    let args = Args::parse();
    match launch(args).await {
        Ok(report) if report.has_failures() => {
            warn!("{}", report.summary());
            process::exit(1);
        }
        Ok(report) => info!("{}", report.summary()),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(2);
        }
    }
}

/// Load, render and (optionally) snapshot everything before the first submission
async fn launch(args: Args) -> Result<BatchReport> {
    let profile = Profile::load(args.profile.as_deref()).context("Can't load launch profile")?;
    let platform = args.platform;
    let overrides = Overrides {
        remote_log_path: args.remote_log_path.clone(),
        project: args.project.clone(),
        resource_type: args.resource_type.clone(),
        extra_flags: args.extra_flags.clone(),
    };

    if args.alarm && platform != Platform::CloudVm {
        warn!("--alarm only applies to {}, ignoring it", Platform::CloudVm);
    }

    let options = profile.render_options(platform, &overrides)?;
    let split_lines = args.split_lines || platform.forces_split_lines();
    let jobs = load(&args.specs, split_lines, Some(&profile.default_batch(platform)))?;
    let payloads = render_all(&jobs, &options)?;

    if let Some(snapshot_dir) = &args.snapshot_dir {
        snapshot(&profile, platform, &overrides, snapshot_dir, args.dry_run).await?;
    }

    let mut tags = BTreeMap::new();
    tags.insert("Project".to_string(), profile.project(&overrides).to_string());
    tags.insert("LaunchedAt".to_string(), Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    let request = SubmitRequest {
        resource_type: profile.resource_type(platform, &overrides).unwrap_or_default(),
        dry_run: args.dry_run,
        tags,
    };
    if args.dry_run {
        info!("--dry-run set, submissions are validated only");
    }

    let report = match platform {
        Platform::CloudVm => {
            let submitter = CloudSubmitter {
                api: Ec2Api::new(&profile.cloud.region)?,
                launch_template: profile.cloud.launch_template.clone(),
                alarm: args.alarm,
            };
            batch::run(&payloads, &submitter, &request).await
        }
        Platform::BatchCluster => {
            if !args.dry_run {
                let output_directory = &options.cluster.output_directory;
                fs::create_dir_all(output_directory)
                    .with_context(|| format!("Can't create SLURM output directory {}", output_directory.display()))?;
            }
            let submitter = ClusterSubmitter {
                api: Sbatch { program: profile.cluster.sbatch_program.clone() },
                script_directory: profile.cluster.script_directory.clone(),
            };
            batch::run(&payloads, &submitter, &request).await
        }
    };

    Ok(report)
}

/// Upload the scheduling directory so the launched code can be matched to its spec files
async fn snapshot(profile: &Profile, platform: Platform, overrides: &Overrides, local_dir: &Path, dry_run: bool) -> Result<()> {
    let target = profile.snapshot_target(platform, overrides)?;
    if dry_run {
        info!("--dry-run set, not syncing {} to {}", local_dir.display(), target);
        return Ok(());
    }

    let excludes = build_excludes(&profile.snapshot_excludes)?;
    let s3 = S3Sync::new(&profile.cloud.region)?;
    let uploaded = s3
        .sync(local_dir, &target, &excludes)
        .await
        .with_context(|| format!("Can't sync {} to {}", local_dir.display(), target))?;
    info!("Uploaded {} files to {}", uploaded, target);
    Ok(())
}
