use crate::core::tasks::job::{self, Job, RunnerStatus};
use crate::err::Result;
use crate::forms::{FormStatus, SubmissionFile, submission_files};
use crate::http::{Http, Request};
use crate::push::ensure_running;
use crate::remote::{AggregateServer, SessionToken};
use crate::sync_error_with_source;
use std::path::PathBuf;
use std::sync::Arc;

/// Per-form transfer strategy for Aggregate servers. Same shape as the
/// Central strategy over Aggregate's flat endpoints; Aggregate detects
/// duplicate submissions server-side, so uploads are not probed first.
#[derive(Clone)]
pub struct PushToAggregate {
    http: Arc<dyn Http>,
    server: AggregateServer,
    storage_dir: PathBuf,
    token: SessionToken,
}

impl PushToAggregate {
    pub fn new(
        http: Arc<dyn Http>,
        server: AggregateServer,
        storage_dir: PathBuf,
        token: SessionToken,
    ) -> Self {
        Self {
            http,
            server,
            storage_dir,
            token,
        }
    }

    /// Build the job that pushes one form. Building performs no I/O.
    pub fn push(&self, form: Arc<FormStatus>) -> Job {
        let op = self.clone();
        let name = format!("push {}", form.name());
        Job::describe(&name, move |status| async move {
            match op.transfer(&form, &status).await {
                Ok(()) => {
                    form.set_status("Success");
                    Ok(())
                }
                Err(e) if job::is_cancelled(&e) => {
                    form.set_status("Push cancelled");
                    Err(e)
                }
                Err(e) => {
                    form.set_status(format!("Failed: {}", e));
                    Err(e)
                }
            }
        })
    }

    async fn transfer(&self, form: &FormStatus, status: &RunnerStatus) -> Result<()> {
        ensure_running(status)?;
        form.set_status("Checking if the form exists on the server");
        if !self.form_exists(form).await? {
            ensure_running(status)?;
            form.set_status("Sending form definition");
            self.push_form_def(form).await?;
        }

        let submissions = submission_files(&self.storage_dir, form.name())?;
        let total = submissions.len();
        for (index, submission) in submissions.iter().enumerate() {
            ensure_running(status)?;
            form.set_status(format!("Sending submission {} of {}", index + 1, total));
            self.push_submission(form, submission).await?;
        }
        Ok(())
    }

    fn authorized(&self, req: Request) -> Request {
        req.with_header("Authorization", self.token.authorization())
    }

    async fn form_exists(&self, form: &FormStatus) -> Result<bool> {
        let url = self
            .server
            .url(&format!("/formXml?formId={}", form.key().id));
        let found = self
            .http
            .execute_opt(self.authorized(Request::get(url)))
            .await
            .map_err(|e| {
                sync_error_with_source!(
                    e,
                    "Can't check form {} on {}",
                    form.name(),
                    self.server.base_url
                )
            })?;
        Ok(found.is_some())
    }

    async fn push_form_def(&self, form: &FormStatus) -> Result<()> {
        let def = tokio::fs::read(form.form_file()).await.map_err(|e| {
            sync_error_with_source!(e, "Can't read form definition {:?}", form.form_file())
        })?;
        let req = self
            .authorized(Request::post(self.server.url("/formUpload")).with_body("application/xml", def));
        match self.http.execute(req).await {
            Ok(_) => Ok(()),
            Err(e) if e.status_code() == Some(409) => Ok(()),
            Err(e) => Err(sync_error_with_source!(e, "Can't push form {}", form.name()).into()),
        }
    }

    async fn push_submission(&self, form: &FormStatus, submission: &SubmissionFile) -> Result<()> {
        let body = tokio::fs::read(&submission.path).await.map_err(|e| {
            sync_error_with_source!(e, "Can't read submission {:?}", submission.path)
        })?;
        let req = self
            .authorized(Request::post(self.server.url("/submission")).with_body("application/xml", body));
        match self.http.execute(req).await {
            Ok(_) => Ok(()),
            // Aggregate answers 409 for a submission it already holds.
            Err(e) if e.status_code() == Some(409) => Ok(()),
            Err(e) => Err(sync_error_with_source!(
                e,
                "Can't push submission {} of form {}",
                submission.instance_id,
                form.name()
            )
            .into()),
        }
    }
}
