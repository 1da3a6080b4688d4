use crate::constants::DEFAULT_HTTP_CONNECTIONS;

/// Transport preferences read once at startup and passed by reference into
/// the pipeline. The connection-pool size bounds how many transfer jobs can
/// hit the network at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPrefs {
    pub max_http_connections: usize,
    pub http_proxy: Option<String>,
}

impl Default for TransferPrefs {
    fn default() -> Self {
        Self {
            max_http_connections: DEFAULT_HTTP_CONNECTIONS,
            http_proxy: None,
        }
    }
}
