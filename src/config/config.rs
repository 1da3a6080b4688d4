use crate::config::TransferPrefs;
use crate::constants::DEFAULT_HTTP_CONNECTIONS;
use crate::err::Result;
use crate::remote::{AggregateServer, CentralServer, Credentials, PushTarget};
use crate::sync_error;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Remote {
    /// "central" or "aggregate".
    pub kind: String,
    pub base_url: String,
    pub project_id: Option<u32>,
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Transfer {
    pub storage_dir: String,
    pub max_http_connections: Option<usize>,
    pub http_proxy: Option<String>,
    pub log_file: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub remote: Remote,
    pub transfer: Transfer,
}

impl Config {
    pub fn from_config(config_path: Option<&str>) -> Result<Self> {
        match config_path {
            Some(p) => {
                let path = expand_tilde(p);
                let content = fs::read_to_string(&path)?;
                match toml::from_str(&content) {
                    Ok(config) => Ok(config),
                    Err(e) => Err(e.into()),
                }
            }
            None => Err("No config file provided".into()),
        }
    }

    pub fn storage_dir(&self) -> PathBuf {
        PathBuf::from(expand_tilde(&self.transfer.storage_dir))
    }

    pub fn log_file(&self) -> PathBuf {
        self.transfer
            .log_file
            .as_deref()
            .map(|p| PathBuf::from(expand_tilde(p)))
            .unwrap_or_else(|| PathBuf::from("formsync.log"))
    }

    pub fn transfer_prefs(&self) -> TransferPrefs {
        TransferPrefs {
            max_http_connections: self
                .transfer
                .max_http_connections
                .unwrap_or(DEFAULT_HTTP_CONNECTIONS),
            http_proxy: self.transfer.http_proxy.clone(),
        }
    }

    pub fn push_target(&self) -> Result<PushTarget> {
        let credentials = Credentials::new(&self.remote.username, &self.remote.password);
        match self.remote.kind.as_str() {
            "central" => {
                let project_id = self.remote.project_id.ok_or_else(|| {
                    sync_error!("A central remote needs a project_id in [remote]")
                })?;
                Ok(PushTarget::Central(CentralServer::new(
                    self.remote.base_url.clone(),
                    project_id,
                    credentials,
                )))
            }
            "aggregate" => Ok(PushTarget::Aggregate(AggregateServer::new(
                self.remote.base_url.clone(),
                credentials,
            ))),
            other => Err(sync_error!("Unknown remote kind {:?}", other).into()),
        }
    }
}

// Expand leading '~/' to HOME to support shell-like paths in config values
fn expand_tilde(p: &str) -> String {
    if let Some(rest) = p.strip_prefix("~/") {
        match std::env::var("HOME") {
            Ok(home) => format!("{}/{}", home, rest),
            Err(_) => p.to_string(),
        }
    } else {
        p.to_string()
    }
}
