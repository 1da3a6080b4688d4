pub mod logger;
pub mod temp_dir;

pub use logger::{AsyncLogger, init_file_logger};
