pub mod config;
pub mod constants;
pub mod core;
pub mod err;
pub mod forms;
pub mod global_var;
pub mod http;
pub mod push;
pub mod remote;
pub mod utilities;

// Re-export commonly used items if needed by external crates/tests
pub use crate::core::tasks::{Job, JobOutcome, JobsRunner};
pub use crate::forms::TransferForms;
