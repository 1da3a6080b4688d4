use crate::core::tasks::job::{self, Job, RunnerStatus};
use crate::err::Result;
use crate::forms::{FormStatus, SubmissionFile, submission_files};
use crate::http::{Http, Request};
use crate::push::ensure_running;
use crate::remote::{CentralServer, SessionToken};
use crate::sync_error_with_source;
use std::path::PathBuf;
use std::sync::Arc;

/// Per-form transfer strategy for Central servers: upload the form
/// definition if the server does not already have it, then every local
/// submission in order, updating the form's status as progress is made.
#[derive(Clone)]
pub struct PushToCentral {
    http: Arc<dyn Http>,
    server: CentralServer,
    storage_dir: PathBuf,
    token: SessionToken,
}

impl PushToCentral {
    pub fn new(
        http: Arc<dyn Http>,
        server: CentralServer,
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
        let url = self.server.project_url(&format!("/forms/{}", form.key().id));
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
        let req = self.authorized(
            Request::post(self.server.project_url("/forms")).with_body("application/xml", def),
        );
        match self.http.execute(req).await {
            Ok(_) => Ok(()),
            // 409: someone else pushed the definition first. Same end state.
            Err(e) if e.status_code() == Some(409) => Ok(()),
            Err(e) => Err(sync_error_with_source!(e, "Can't push form {}", form.name()).into()),
        }
    }

    async fn push_submission(&self, form: &FormStatus, submission: &SubmissionFile) -> Result<()> {
        let probe = self.server.project_url(&format!(
            "/forms/{}/submissions/{}",
            form.key().id,
            submission.instance_id
        ));
        let already_there = self
            .http
            .execute_opt(self.authorized(Request::get(probe)))
            .await
            .map_err(|e| {
                sync_error_with_source!(
                    e,
                    "Can't check submission {} of form {}",
                    submission.instance_id,
                    form.name()
                )
            })?
            .is_some();
        if already_there {
            return Ok(());
        }

        let body = tokio::fs::read(&submission.path).await.map_err(|e| {
            sync_error_with_source!(e, "Can't read submission {:?}", submission.path)
        })?;
        let url = self
            .server
            .project_url(&format!("/forms/{}/submissions", form.key().id));
        let req = self.authorized(Request::post(url).with_body("application/xml", body));
        match self.http.execute(req).await {
            Ok(_) => Ok(()),
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
