//! A small asynchronous logger built on Tokio.
//!
//! A background task receives log records over an mpsc channel and appends
//! them to a file without blocking the async tasks that emit them. The
//! `LOGGER` static in `global_var` derefs to the installed handle, or to a
//! lazily installed no-op fallback when nothing was initialized.

use crate::err::Result;
use crate::global_var::{DEBUG_MODE, LOGGER_CELL};
use std::fmt;
use std::ops::Deref;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Log level for messages.
#[derive(Clone, Copy, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

/// A simple async logger handle. Cloning creates another sender handle.
#[derive(Clone, Debug)]
pub struct AsyncLogger {
    tx: mpsc::Sender<LogRecord>,
}

impl AsyncLogger {
    fn log<S: Into<String>>(&self, level: LogLevel, msg: S) {
        let str_msg = msg.into();
        if *DEBUG_MODE {
            println!("{}: {}", level, &str_msg);
        }
        match self.tx.try_send(LogRecord::new(level, str_msg)) {
            Ok(_) => {}
            // Closed means the writer is gone (shutdown, or the no-op
            // fallback): drop the record quietly.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(err) => {
                eprintln!("Failed to send log message: {}", err);
            }
        }
    }

    /// Request the logger task to flush and shut down.
    pub async fn shutdown(&self) {
        // Ignore send error (e.g., task already closed)
        let _ = self.tx.send(LogRecord::Shutdown).await;
    }

    pub fn trace<S: Into<String>>(&self, msg: S) {
        self.log(LogLevel::Trace, msg);
    }
    pub fn debug<S: Into<String>>(&self, msg: S) {
        if *DEBUG_MODE {
            self.log(LogLevel::Debug, msg);
        }
    }
    pub fn info<S: Into<String>>(&self, msg: S) {
        self.log(LogLevel::Info, msg);
    }
    pub fn warn<S: Into<String>>(&self, msg: S) {
        self.log(LogLevel::Warn, msg);
    }
    pub fn error<S: Into<String>>(&self, msg: S) {
        self.log(LogLevel::Error, msg);
    }
}

#[derive(Debug)]
enum LogRecord {
    Message {
        level: LogLevel,
        msg: String,
        ts: chrono::DateTime<chrono::Utc>,
    },
    Shutdown,
}

impl LogRecord {
    fn new(level: LogLevel, msg: String) -> Self {
        Self::Message {
            level,
            msg,
            ts: chrono::Utc::now(),
        }
    }

    fn format_line(&self) -> Option<String> {
        match self {
            LogRecord::Message { level, msg, ts } => Some(format!(
                "{} [{}] {}\n",
                ts.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                level,
                msg
            )),
            LogRecord::Shutdown => None,
        }
    }
}

/// Initialize a file-based async logger. Returns the logger handle and the
/// background task handle. Dropping the last logger handle closes the channel
/// and lets the task shut down.
pub async fn init_file_logger<P: AsRef<Path>>(path: P) -> Result<(AsyncLogger, JoinHandle<()>)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())
        .await?;

    let (tx, mut rx) = mpsc::channel::<LogRecord>(1024);
    let mut writer = BufWriter::new(file);

    let task = tokio::spawn(async move {
        while let Some(rec) = rx.recv().await {
            match rec.format_line() {
                Some(line) => {
                    if let Err(e) = writer.write_all(line.as_bytes()).await {
                        eprintln!("Logger failed to write: {}", e);
                    }
                    let _ = writer.flush().await;
                }
                // Shutdown record
                None => break,
            }
        }
        // Flush remaining data before exit
        let _ = writer.flush().await;
    });

    Ok((AsyncLogger { tx }, task))
}

pub(crate) struct Logger;

impl Deref for Logger {
    type Target = AsyncLogger;
    fn deref(&self) -> &Self::Target {
        if let Some(l) = LOGGER_CELL.get() {
            return l;
        }
        // Not initialized (library consumers, tests): install a no-op handle
        // lazily so LOGGER.*() never panics or prints.
        let _ = LOGGER_CELL.set(fallback_logger());
        LOGGER_CELL
            .get()
            .expect("LOGGER_CELL was just initialized")
    }
}

fn fallback_logger() -> AsyncLogger {
    // Closed channel: every record takes the quiet Closed branch in log().
    let (tx, rx) = mpsc::channel::<LogRecord>(1);
    drop(rx);
    AsyncLogger { tx }
}
