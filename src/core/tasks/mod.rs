pub mod job;
pub mod runner;

pub use job::{Job, JobOutcome, RunnerStatus};
pub use runner::{JobsRunner, RunnerState};
