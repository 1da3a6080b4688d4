use crate::utilities::AsyncLogger;
use std::sync::{LazyLock, OnceLock};

pub static LOGGER_CELL: OnceLock<AsyncLogger> = OnceLock::new();
pub(crate) static LOGGER: crate::utilities::logger::Logger = crate::utilities::logger::Logger;
pub static DEBUG_MODE: LazyLock<bool> = LazyLock::new(|| {
    let env_var = std::env::var("DEBUG_MODE").unwrap_or_default();
    env_var == "1" || env_var == "true"
});
