mod config;
mod opts;
mod prefs;

pub use config::Config;
pub use opts::Opts;
pub use prefs::TransferPrefs;
