/// Default size of the shared HTTP connection pool. Bounds how many per-form
/// transfer jobs can actually hit the network at once.
pub const DEFAULT_HTTP_CONNECTIONS: usize = 8;

/// Per-request timeout for remote calls, in seconds.
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Subdirectory of the storage dir that holds form definitions.
pub const FORMS_DIR: &str = "forms";

/// Subdirectory of a form dir that holds collected submissions.
pub const INSTANCES_DIR: &str = "instances";

/// Status given to encrypted forms excluded from a push.
pub const STATUS_SKIPPED_ENCRYPTED: &str = "skipped: encryption unsupported";
