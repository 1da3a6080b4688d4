use std::fmt::{Debug, Display, Formatter};

pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub struct SyncError {
    err: String,
    file: &'static str,
    line: u32,
    // Store Send + Sync error for thread-safety; we can still expose it as `&dyn Error` in `source()`
    source: Option<Error>,
}

impl SyncError {
    pub fn new(
        err: impl Into<String>,
        file: &'static str,
        line: u32,
        source: Option<Error>,
    ) -> Self {
        Self {
            err: err.into(),
            file,
            line,
            source,
        }
    }
}

#[macro_export]
macro_rules! sync_error {
    ($fmt:expr $(, $($args:tt)*)?) => {
        $crate::err::SyncError::new(
            format!($fmt $(,$($args)*)?),
            file!(), line!(), None)
    };
}

#[macro_export]
macro_rules! sync_error_with_source {
    ($source:expr, $fmt:expr $(, $($args:tt)*)?) => {
        $crate::err::SyncError::new(
            format!($fmt $(,$($args)*)?),
            file!(), line!(), Some(Into::<$crate::err::Error>::into($source)))
    }
}

impl Debug for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]:{} {}", self.file, self.line, self.err)
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error))
    }
}

/// This is defined as a convenience.
pub type Result<T> = std::result::Result<T, Error>;
