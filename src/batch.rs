//! Drive a whole batch through the submitter, one job at a time

use chrono::{DateTime, Utc};
use log::info;

use crate::render::payload::RenderedPayload;
use crate::submit::{SubmissionResult, SubmitRequest, Submitter};

/// Results of every submission attempt, in launch order
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub results: Vec<SubmissionResult>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &SubmissionResult> {
        self.results.iter().filter(|result| result.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn summary(&self) -> String {
        let failed = self.failures().count();
        let elapsed = self.finished - self.started;
        format!(
            "{} of {} jobs submitted, {} failed, in {}s",
            self.results.len() - failed,
            self.results.len(),
            failed,
            elapsed.num_seconds()
        )
    }
}

/// Submit every payload in order
///
/// A failed submission is reported and recorded, then the next job is attempted.
pub async fn run<S: Submitter + ?Sized>(payloads: &[RenderedPayload], submitter: &S, request: &SubmitRequest) -> BatchReport {
    let started = Utc::now();
    let mut results = Vec::with_capacity(payloads.len());

    for payload in payloads {
        println!("Launching {} with commands:", payload.job.name);
        println!("{}", payload.job.command);

        let result = submitter.submit(payload, request).await;
        match (&result.error, &result.backend_handle) {
            (Some(err), _) => eprintln!("{}: {}", payload.job.name, err),
            (None, Some(handle)) => println!("Launched. {handle}"),
            (None, None) => println!("Launched (dry run, nothing allocated)."),
        }
        results.push(result);
    }

    let report = BatchReport { started, finished: Utc::now(), results };
    info!("{}", report.summary());
    println!("Done.");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::platform::Platform;
    use crate::error::BackendError;
    use crate::render::payload::render_all;
    use crate::render::script::tests::options;
    use crate::spec::job::JobSpec;
    use crate::spec::load::{load, DefaultBatch};
    use crate::submit::cloud::tests::FakeCloud;
    use crate::submit::cloud::CloudSubmitter;

    fn cloud(api: FakeCloud) -> CloudSubmitter<FakeCloud> {
        CloudSubmitter { api, launch_template: "SeqDesignTrain".to_string(), alarm: false }
    }

    fn request(dry_run: bool) -> SubmitRequest {
        SubmitRequest { resource_type: "p2.xlarge".to_string(), dry_run, ..Default::default() }
    }

    #[tokio::test]
    async fn one_rejected_job_does_not_stop_the_batch() {
        let jobs = vec![JobSpec::new("a", "--lr 0.1"), JobSpec::new("b", "--lr 0.2"), JobSpec::new("c", "--lr 0.3")];
        let payloads = render_all(&jobs, &options(Platform::CloudVm)).unwrap();
        let submitter = cloud(FakeCloud { reject: vec!["b".to_string()], ..Default::default() });

        let report = run(&payloads, &submitter, &request(false)).await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[0].backend_handle.as_deref(), Some("i-0000"));
        assert!(matches!(report.results[1].error, Some(BackendError::Rejected(_))));
        assert_eq!(report.results[2].backend_handle.as_deref(), Some("i-0001"));
        assert_eq!(report.failures().count(), 1);
        assert!(report.has_failures());
    }

    #[tokio::test]
    async fn default_jobs_go_through_the_same_pipeline() {
        let default = DefaultBatch {
            jobs: vec![JobSpec::new("smoke_a", "--seed 11"), JobSpec::new("smoke_b", "--seed 22")],
            pause: Duration::from_millis(5),
        };
        let jobs = load(&[], false, Some(&default)).unwrap();
        let payloads = render_all(&jobs, &options(Platform::CloudVm)).unwrap();
        let submitter = cloud(FakeCloud::default());

        let report = run(&payloads, &submitter, &request(false)).await;

        assert!(!report.has_failures());
        let requests = submitter.api.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].init_payload.contains("--seed 22 --s3-path s3://lab-bucket/seqdesign || EXIT_STATUS=$?"));
    }

    #[tokio::test]
    async fn dry_run_batch_has_no_handles() {
        let jobs = vec![JobSpec::new("a", "--lr 0.1"), JobSpec::new("b", "--lr 0.2")];
        let payloads = render_all(&jobs, &options(Platform::CloudVm)).unwrap();
        let submitter = cloud(FakeCloud::default());

        let report = run(&payloads, &submitter, &request(true)).await;

        assert!(report.results.iter().all(|r| r.backend_handle.is_none() && r.error.is_none()));
        assert!(submitter.api.instances.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_counts_failures() {
        let payloads = render_all(&[JobSpec::new("a", "--lr 0.1")], &options(Platform::CloudVm)).unwrap();
        let submitter = cloud(FakeCloud { reject: vec!["a".to_string()], ..Default::default() });

        let report = run(&payloads, &submitter, &request(false)).await;

        assert!(report.summary().starts_with("0 of 1 jobs submitted, 1 failed"));
    }
}
