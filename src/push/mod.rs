use crate::constants::STATUS_SKIPPED_ENCRYPTED;
use crate::core::tasks::job::{self, Job, RunnerStatus};
use crate::core::tasks::runner::JobsRunner;
use crate::err::Result;
use crate::forms::{FormMetadataPort, TransferForms};
use crate::global_var::LOGGER;
use crate::http::Http;
use crate::remote::PushTarget;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

mod aggregate;
mod central;

pub use aggregate::PushToAggregate;
pub use central::PushToCentral;

/// Domain event published for the presentation layer. Fired exactly once per
/// pipeline invocation, no matter how many forms individually failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEvent {
    Complete,
}

/// Orchestrates pushing a set of forms to one remote server: filters
/// ineligible forms, authenticates once, maps each eligible form to its own
/// job, and launches them all concurrently.
pub struct PushPipeline {
    http: Arc<dyn Http>,
    events: mpsc::UnboundedSender<PushEvent>,
}

impl PushPipeline {
    pub fn new(http: Arc<dyn Http>, events: mpsc::UnboundedSender<PushEvent>) -> Self {
        Self { http, events }
    }

    /// Versioning advisory: names every selected form with submissions for
    /// more than one version. Read-only and non-blocking; the caller decides
    /// whether to proceed.
    pub fn push_warning(
        &self,
        metadata: &dyn FormMetadataPort,
        forms: &TransferForms,
    ) -> Result<Option<String>> {
        let mut multi_version = Vec::new();
        for form in forms.iter() {
            let mut known = metadata.submission_versions(form.key())?;
            if let Some(version) = &form.key().version {
                known.insert(version.clone());
            }
            if known.len() > 1 {
                multi_version.push(String::from(form.name()));
            }
        }
        if multi_version.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "Some forms ({}) have submissions for multiple versions, but only the latest \
             form definition is stored locally. If you proceed, the same definition will \
             be pushed for every version not already on the server.",
            multi_version.join(", ")
        )))
    }

    /// Push the selected forms to `target`.
    ///
    /// Encrypted forms are excluded and marked before any asynchronous work
    /// starts. An authentication failure aborts the whole invocation before
    /// any per-form job is created. Per-form failures stay local to their
    /// job; the returned runner always reaches a terminal state and the
    /// `PushEvent::Complete` event fires exactly once.
    pub async fn push(
        &self,
        forms: &TransferForms,
        target: &PushTarget,
        storage_dir: &Path,
    ) -> Result<JobsRunner> {
        for form in forms.filter(|f| f.is_encrypted()) {
            form.set_status(STATUS_SKIPPED_ENCRYPTED);
        }

        let token = target.authenticate(self.http.as_ref()).await?;

        let eligible = forms.filter(|f| !f.is_encrypted());
        let jobs: Vec<Job> = match target {
            PushTarget::Central(server) => {
                let op = PushToCentral::new(
                    self.http.clone(),
                    server.clone(),
                    storage_dir.to_path_buf(),
                    token,
                );
                eligible.iter().map(|form| op.push(form.clone())).collect()
            }
            PushTarget::Aggregate(server) => {
                let op = PushToAggregate::new(
                    self.http.clone(),
                    server.clone(),
                    storage_dir.to_path_buf(),
                    token,
                );
                eligible.iter().map(|form| op.push(form.clone())).collect()
            }
        };

        LOGGER.info(format!(
            "Pushing {} form(s) to {}",
            jobs.len(),
            target.description()
        ));

        let events = self.events.clone();
        Ok(JobsRunner::launch_async(jobs).on_complete(move || {
            let _ = events.send(PushEvent::Complete);
        }))
    }
}

/// Safe-point cancellation check for transfer bodies.
pub(crate) fn ensure_running(status: &RunnerStatus) -> Result<()> {
    if status.is_still_running() {
        Ok(())
    } else {
        Err(job::cancelled())
    }
}
