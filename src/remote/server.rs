use crate::err::Result;
use crate::http::{Http, Request};
use crate::remote::session::{Credentials, SessionToken};
use crate::sync_error_with_source;
use serde::Deserialize;

/// An ODK Central server: project-scoped REST API with session tokens.
#[derive(Debug, Clone)]
pub struct CentralServer {
    pub base_url: String,
    pub project_id: u32,
    pub credentials: Credentials,
}

impl CentralServer {
    pub fn new(base_url: impl Into<String>, project_id: u32, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.into(),
            project_id,
            credentials,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// URL under this server's project, e.g. `project_url("/forms")`.
    pub fn project_url(&self, suffix: &str) -> String {
        self.url(&format!("/v1/projects/{}{}", self.project_id, suffix))
    }

    fn session_request(&self) -> Result<Request> {
        Request::post(self.url("/v1/sessions")).with_json(&serde_json::json!({
            "email": self.credentials.username,
            "password": self.credentials.password,
        }))
    }
}

/// An ODK Aggregate server: flat endpoints, preemptive Basic auth.
#[derive(Debug, Clone)]
pub struct AggregateServer {
    pub base_url: String,
    pub credentials: Credentials,
}

impl AggregateServer {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// The kinds of server a push can address. Each variant carries its own
/// authentication and transfer strategy behind this one contract.
#[derive(Debug, Clone)]
pub enum PushTarget {
    Central(CentralServer),
    Aggregate(AggregateServer),
}

#[derive(Deserialize)]
struct CentralSession {
    token: String,
}

impl PushTarget {
    pub fn description(&self) -> &str {
        match self {
            PushTarget::Central(s) => &s.base_url,
            PushTarget::Aggregate(s) => &s.base_url,
        }
    }

    /// Obtain a usable credential with exactly one HTTP call. Failure here is
    /// fatal to the whole pipeline invocation; no transfer job is created
    /// without a token.
    pub async fn authenticate(&self, http: &dyn Http) -> Result<SessionToken> {
        match self {
            PushTarget::Central(server) => {
                let resp = http
                    .execute(server.session_request()?)
                    .await
                    .map_err(|e| {
                        sync_error_with_source!(e, "Can't authenticate with {}", server.base_url)
                    })?;
                let session: CentralSession = resp.json().map_err(|e| {
                    sync_error_with_source!(e, "Unexpected session response from {}", server.base_url)
                })?;
                Ok(SessionToken::bearer(session.token))
            }
            PushTarget::Aggregate(server) => {
                // Aggregate has no session endpoint; verify the credentials
                // with a formList preflight and keep using them directly.
                let token = SessionToken::basic(&server.credentials);
                let req = Request::get(server.url("/formList"))
                    .with_header("Authorization", token.authorization());
                http.execute(req).await.map_err(|e| {
                    sync_error_with_source!(e, "Can't authenticate with {}", server.base_url)
                })?;
                Ok(token)
            }
        }
    }
}
