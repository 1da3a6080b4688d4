use crate::err::{Error, Result};
use crate::global_var::LOGGER;
use crate::sync_error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation signal shared by every job launched under one
/// runner. Work bodies poll `is_still_running` at safe points; cancellation
/// is advisory, never preemptive.
#[derive(Debug, Clone, Default)]
pub struct RunnerStatus {
    cancelled: Arc<AtomicBool>,
}

impl RunnerStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_still_running(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Marker error a work body returns once it observes cancellation, so the
/// job still reaches an explicit terminal state.
#[derive(Debug)]
pub struct CancelledError;

impl Display for CancelledError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "job cancelled")
    }
}

impl std::error::Error for CancelledError {}

pub fn cancelled() -> Error {
    Box::new(CancelledError)
}

pub fn is_cancelled(err: &Error) -> bool {
    err.downcast_ref::<CancelledError>().is_some()
}

/// Terminal state of one job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

pub type JobFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;
type Work = Box<dyn FnOnce(RunnerStatus) -> JobFuture + Send + 'static>;

/// A lazily-described unit of asynchronous work. Describing a job has no
/// side effect; only running it does. Jobs compose with [`Job::chain`] and
/// [`Job::all`] without executing.
pub struct Job {
    name: String,
    work: Work,
}

impl Job {
    pub fn describe<W, F>(name: &str, work: W) -> Self
    where
        W: FnOnce(RunnerStatus) -> F + Send + 'static,
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: String::from(name),
            work: Box::new(move |status| Box::pin(work(status))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A job that runs `self`, then `next` on success. Failure in `self`
    /// short-circuits and propagates without invoking `next`.
    pub fn chain(self, next: Job) -> Job {
        let name = format!("{} then {}", self.name, next.name);
        Job {
            name,
            work: Box::new(move |status| {
                Box::pin(async move {
                    (self.work)(status.clone()).await?;
                    (next.work)(status).await
                })
            }),
        }
    }

    /// One job representing concurrent execution of every input, each on its
    /// own task. It completes only once all inputs are terminal; its failure
    /// set is the union of member failures. A failing member never cancels
    /// its siblings.
    pub fn all(jobs: Vec<Job>) -> Job {
        Job::describe("all", move |status| async move {
            let mut handles = Vec::with_capacity(jobs.len());
            for job in jobs {
                handles.push(tokio::spawn(job.run(status.clone())));
            }

            let mut failures = Vec::new();
            let mut any_cancelled = false;
            for handle in handles {
                match handle.await {
                    Ok(JobOutcome::Completed) => {}
                    Ok(JobOutcome::Failed(msg)) => failures.push(msg),
                    Ok(JobOutcome::Cancelled) => any_cancelled = true,
                    Err(join_err) => failures.push(format!("job panicked: {}", join_err)),
                }
            }

            if !failures.is_empty() {
                return Err(sync_error!("{}", failures.join("; ")).into());
            }
            if any_cancelled {
                return Err(cancelled());
            }
            Ok(())
        })
    }

    /// Run the job to a terminal state. Failures are captured in the
    /// outcome, never propagated as panics or control flow.
    pub async fn run(self, status: RunnerStatus) -> JobOutcome {
        let Job { name, work } = self;
        if !status.is_still_running() {
            return JobOutcome::Cancelled;
        }
        match work(status).await {
            Ok(()) => JobOutcome::Completed,
            Err(e) if is_cancelled(&e) => JobOutcome::Cancelled,
            Err(e) => {
                LOGGER.error(format!("Job {} failed: {}", name, e));
                JobOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_job(name: &str, counter: Arc<AtomicUsize>) -> Job {
        Job::describe(name, move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn failing_job(name: &str, msg: &'static str) -> Job {
        Job::describe(name, move |_| async move { Err(sync_error!("{}", msg).into()) })
    }

    #[tokio::test]
    async fn describe_has_no_side_effect_until_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let job = counting_job("lazy", counter.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        let outcome = job.run(RunnerStatus::new()).await;
        assert_eq!(outcome, JobOutcome::Completed);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_captured_as_outcome() {
        let outcome = failing_job("bad", "boom").run(RunnerStatus::new()).await;
        assert_eq!(outcome, JobOutcome::Failed("boom".into()));
    }

    #[tokio::test]
    async fn chain_runs_in_declared_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        let first = Job::describe("first", move |_| async move {
            o1.lock().unwrap().push("first");
            Ok(())
        });
        let second = Job::describe("second", move |_| async move {
            o2.lock().unwrap().push("second");
            Ok(())
        });

        let outcome = first.chain(second).run(RunnerStatus::new()).await;
        assert_eq!(outcome, JobOutcome::Completed);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn chain_short_circuits_on_failure() {
        let counter = Arc::new(AtomicUsize::new(0));
        let next = counting_job("next", counter.clone());
        let outcome = failing_job("broken", "no luck")
            .chain(next)
            .run(RunnerStatus::new())
            .await;
        assert_eq!(outcome, JobOutcome::Failed("no luck".into()));
        assert_eq!(counter.load(Ordering::SeqCst), 0, "next must not run");
    }

    #[tokio::test]
    async fn all_completes_after_every_member() {
        let counter = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<Job> = (0..5)
            .map(|i| counting_job(&format!("member-{}", i), counter.clone()))
            .collect();
        let outcome = Job::all(jobs).run(RunnerStatus::new()).await;
        assert_eq!(outcome, JobOutcome::Completed);
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn all_of_nothing_completes() {
        let outcome = Job::all(Vec::new()).run(RunnerStatus::new()).await;
        assert_eq!(outcome, JobOutcome::Completed);
    }

    #[tokio::test]
    async fn member_failure_does_not_cancel_siblings() {
        let counter = Arc::new(AtomicUsize::new(0));
        let jobs = vec![
            failing_job("bad-1", "first failure"),
            counting_job("ok-1", counter.clone()),
            failing_job("bad-2", "second failure"),
            counting_job("ok-2", counter.clone()),
        ];
        let outcome = Job::all(jobs).run(RunnerStatus::new()).await;
        match outcome {
            JobOutcome::Failed(msg) => {
                assert!(msg.contains("first failure"));
                assert!(msg.contains("second failure"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2, "siblings must finish");
    }

    #[tokio::test]
    async fn pre_cancelled_job_is_terminal_without_executing() {
        let counter = Arc::new(AtomicUsize::new(0));
        let status = RunnerStatus::new();
        status.cancel();
        let outcome = counting_job("never", counter.clone()).run(status).await;
        assert_eq!(outcome, JobOutcome::Cancelled);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn body_observing_cancellation_reports_cancelled() {
        let status = RunnerStatus::new();
        let job = Job::describe("poller", |status: RunnerStatus| async move {
            loop {
                if !status.is_still_running() {
                    return Err(cancelled());
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        });

        let handle = tokio::spawn(job.run(status.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        status.cancel();
        let outcome = handle.await.expect("join");
        assert_eq!(outcome, JobOutcome::Cancelled);
    }
}
