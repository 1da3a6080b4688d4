use crate::core::tasks::job::{Job, JobOutcome, RunnerStatus};
use crate::global_var::LOGGER;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// Lifecycle of one launched set of jobs. No transition goes back; once
/// terminal, the handle is immutable and the completion callbacks have fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Scheduled,
    Running,
    Completed,
    Cancelled,
}

impl RunnerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunnerState::Completed | RunnerState::Cancelled)
    }
}

type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

struct RunnerInner {
    state: RunnerState,
    callbacks: Vec<CompletionCallback>,
    outcomes: Vec<(String, JobOutcome)>,
}

/// Handle for one in-flight execution of a set of jobs. Each job runs on its
/// own Tokio task; a supervisor task collects per-job outcomes over an mpsc
/// channel and fires the registered completion callbacks exactly once, after
/// the last job reaches a terminal state.
pub struct JobsRunner {
    status: RunnerStatus,
    inner: Arc<Mutex<RunnerInner>>,
    done_rx: watch::Receiver<bool>,
}

impl std::fmt::Debug for JobsRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobsRunner").finish_non_exhaustive()
    }
}

impl JobsRunner {
    /// Schedule every job concurrently and return immediately.
    pub fn launch_async(jobs: Vec<Job>) -> Self {
        let status = RunnerStatus::new();
        let inner = Arc::new(Mutex::new(RunnerInner {
            state: RunnerState::Scheduled,
            callbacks: Vec::new(),
            outcomes: Vec::new(),
        }));
        let (done_tx, done_rx) = watch::channel(false);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<(String, JobOutcome)>();

        let scheduled = jobs.len();
        for job in jobs {
            let job_status = status.clone();
            let outcome_tx = outcome_tx.clone();
            let name = String::from(job.name());
            tokio::spawn(async move {
                let outcome = job.run(job_status).await;
                // The supervisor holds the receiver for as long as it runs.
                let _ = outcome_tx.send((name, outcome));
            });
        }
        drop(outcome_tx);

        let supervisor_inner = inner.clone();
        let supervisor_status = status.clone();
        tokio::spawn(async move {
            supervisor_inner.lock().unwrap().state = RunnerState::Running;

            let mut outcomes = Vec::with_capacity(scheduled);
            // Every job task owns a sender clone; the channel closes once the
            // last job is terminal.
            while let Some(entry) = outcome_rx.recv().await {
                outcomes.push(entry);
            }

            let callbacks = {
                let mut guard = supervisor_inner.lock().unwrap();
                guard.outcomes = outcomes;
                guard.state = if supervisor_status.is_still_running() {
                    RunnerState::Completed
                } else {
                    RunnerState::Cancelled
                };
                std::mem::take(&mut guard.callbacks)
            };
            for callback in callbacks {
                callback();
            }
            let _ = done_tx.send(true);
            LOGGER.debug(format!("Runner finished, {} job(s) terminal", scheduled));
        });

        Self {
            status,
            inner,
            done_rx,
        }
    }

    /// Register a callback invoked exactly once after the last scheduled job
    /// is terminal. If everything already completed, it runs immediately.
    pub fn on_complete<F>(self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let mut guard = self.inner.lock().unwrap();
        if guard.state.is_terminal() {
            drop(guard);
            callback();
        } else {
            guard.callbacks.push(Box::new(callback));
            drop(guard);
        }
        self
    }

    /// Request cooperative cancellation of all outstanding jobs. Each job
    /// observes it at its next safe point; aggregate completion still fires.
    pub fn cancel(&self) {
        self.status.cancel();
    }

    pub fn state(&self) -> RunnerState {
        self.inner.lock().unwrap().state
    }

    /// Per-job outcomes, populated once the runner is terminal.
    pub fn outcomes(&self) -> Vec<(String, JobOutcome)> {
        self.inner.lock().unwrap().outcomes.clone()
    }

    /// Wait until the runner is terminal and the completion callbacks fired.
    pub async fn wait(&self) {
        let mut rx = self.done_rx.clone();
        let _ = rx.wait_for(|done| *done).await;
    }
}
