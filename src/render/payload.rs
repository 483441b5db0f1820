use log::info;
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::error::RenderError;
use crate::platform::Platform;
use crate::render::options::RenderOptions;
use crate::render::script::Script;
use crate::render::shell::{check_command, check_path, RUN_SCRIPT_DELIMITER, SETUP_DELIMITER};
use crate::spec::job::JobSpec;

/// Exact text handed to the backend for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPayload {
    pub job: JobSpec,
    pub text: String,
}

/// Rendering context for cloud-init user-data
#[derive(Serialize)]
struct CloudInitContext {
    user: String,
    setup: String,
    setup_delimiter: &'static str,
    log_path: String,
    working_directory: String,
    run_delimiter: &'static str,
    run_script: String,
    session: String,
}

/// Rendering context for the sbatch header
#[derive(Serialize)]
struct SbatchHeaderContext {
    name: String,
    cpus: u32,
    memory: String,
    time: String,
    partition: String,
    gres: String,
    output_directory: String,
}

/// Render a job into the payload for the batch's platform
///
/// Rendering is deterministic: the same job and options always give the same text.
pub fn render(job: &JobSpec, options: &RenderOptions) -> Result<RenderedPayload, RenderError> {
    let script = Script::for_job(job, options)?;
    info!("Rendering {} with {} commands", job.name, script.commands().count());
    let text = match options.platform {
        Platform::CloudVm => render_cloud_init(&script, options)?,
        Platform::BatchCluster => render_sbatch(job, &script, options)?,
    };
    Ok(RenderedPayload { job: job.clone(), text })
}

/// Render a whole batch up front, so a bad job stops the batch before anything is launched
pub fn render_all(jobs: &[JobSpec], options: &RenderOptions) -> Result<Vec<RenderedPayload>, RenderError> {
    info!("Rendering {} payloads for {}", jobs.len(), options.platform);
    jobs.iter().map(|job| render(job, options)).collect()
}

fn render_cloud_init(script: &Script, options: &RenderOptions) -> Result<String, RenderError> {
    /// included cloud-init template
    static CLOUD_INIT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/cloud_init.txt"));

    let host = &options.cloud;
    let mut setup = String::new();
    for line in &host.setup {
        check_command("setup", line)?;
        setup.push_str(line);
        setup.push('\n');
    }

    // both paths end up inside the quoted `su -c` and `pipe-pane` strings
    let log_path = options.log_path();
    check_path(&log_path)?;
    check_path(&options.working_directory)?;

    let context = CloudInitContext {
        user: host.user.clone(),
        setup,
        setup_delimiter: SETUP_DELIMITER,
        log_path: log_path.to_string_lossy().into_owned(),
        working_directory: options.working_directory.to_string_lossy().into_owned(),
        run_delimiter: RUN_SCRIPT_DELIMITER,
        run_script: script.to_text(),
        session: host.session.clone(),
    };
    render_template("cloud_init", CLOUD_INIT, &context)
}

fn render_sbatch(job: &JobSpec, script: &Script, options: &RenderOptions) -> Result<String, RenderError> {
    /// included sbatch header template
    static HEADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/sbatch_header.txt"));

    let resources = &options.cluster;
    check_path(&resources.output_directory)?;
    let context = SbatchHeaderContext {
        name: job.name.clone(),
        cpus: resources.cpus,
        memory: resources.memory.clone(),
        time: resources.time.clone(),
        partition: resources.partition.clone(),
        gres: resources.gres(),
        output_directory: resources.output_directory.to_string_lossy().trim_end_matches('/').to_string(),
    };
    let mut text = render_template("sbatch_header", HEADER, &context)?;
    text.push_str(&script.to_text());
    Ok(text)
}

fn render_template<C: Serialize>(name: &'static str, template: &'static str, context: &C) -> Result<String, RenderError> {
    let mut tt = TinyTemplate::new();
    // payloads are shell, not HTML
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(name, template)
        .map_err(|err| RenderError::Template { name, reason: err.to_string() })?;
    tt.render(name, context)
        .map_err(|err| RenderError::Template { name, reason: err.to_string() })
}
