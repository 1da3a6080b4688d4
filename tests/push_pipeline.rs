use async_trait::async_trait;
use bytes::Bytes;
use formsync::core::tasks::JobOutcome;
use formsync::err::Result;
use formsync::forms::{FsFormMetadata, scan_forms};
use formsync::http::{Http, HttpError, HttpResult, Method, Request, Response};
use formsync::push::{PushEvent, PushPipeline};
use formsync::remote::{CentralServer, Credentials, PushTarget};
use formsync::utilities::temp_dir::TmpDirGuard;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// In-memory stand-in for a Central server: grants sessions, remembers which
/// forms and submissions it holds, and can be told to drop the connection
/// for a given form's submission uploads.
#[derive(Default)]
struct FakeCentral {
    deny_sessions: bool,
    forms: Mutex<HashSet<String>>,
    submissions: Mutex<HashSet<(String, String)>>,
    broken_forms: Mutex<HashSet<String>>,
    submission_posts: Mutex<usize>,
    form_posts: Mutex<usize>,
}

fn attr(body: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let marker = format!("{}=\"", name);
    let start = text.find(&marker)? + marker.len();
    let end = text[start..].find('"')? + start;
    Some(text[start..end].to_string())
}

#[async_trait]
impl Http for FakeCentral {
    async fn execute(&self, req: Request) -> HttpResult<Response> {
        let path = req
            .url
            .strip_prefix("https://central.example.org")
            .unwrap_or(&req.url)
            .to_string();

        if req.method == Method::Post && path == "/v1/sessions" {
            return if self.deny_sessions {
                Err(HttpError::Status {
                    code: 401,
                    body: String::new(),
                })
            } else {
                Ok(Response {
                    status: 200,
                    body: Bytes::from_static(br#"{"token":"fake-token"}"#),
                })
            };
        }

        // Everything past this point needs the session token.
        assert!(
            req.headers
                .iter()
                .any(|(k, v)| k == "Authorization" && v == "Bearer fake-token"),
            "unauthenticated request to {}",
            path
        );

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match (req.method, segments.as_slice()) {
            (Method::Get, ["v1", "projects", _, "forms", id]) => {
                if self.forms.lock().unwrap().contains(*id) {
                    Ok(Response {
                        status: 200,
                        body: Bytes::new(),
                    })
                } else {
                    Err(HttpError::Status {
                        code: 404,
                        body: String::new(),
                    })
                }
            }
            (Method::Post, ["v1", "projects", _, "forms"]) => {
                *self.form_posts.lock().unwrap() += 1;
                let id = attr(req.body.as_deref().unwrap_or_default(), "id")
                    .expect("form definition without id");
                self.forms.lock().unwrap().insert(id);
                Ok(Response {
                    status: 200,
                    body: Bytes::new(),
                })
            }
            (Method::Get, ["v1", "projects", _, "forms", id, "submissions", instance]) => {
                let key = (id.to_string(), instance.to_string());
                if self.submissions.lock().unwrap().contains(&key) {
                    Ok(Response {
                        status: 200,
                        body: Bytes::new(),
                    })
                } else {
                    Err(HttpError::Status {
                        code: 404,
                        body: String::new(),
                    })
                }
            }
            (Method::Post, ["v1", "projects", _, "forms", id, "submissions"]) => {
                if self.broken_forms.lock().unwrap().contains(*id) {
                    return Err(HttpError::Network(String::from("connection reset by peer")));
                }
                *self.submission_posts.lock().unwrap() += 1;
                let instance = attr(req.body.as_deref().unwrap_or_default(), "instanceID")
                    .expect("submission without instanceID");
                self.submissions
                    .lock()
                    .unwrap()
                    .insert((id.to_string(), instance));
                Ok(Response {
                    status: 200,
                    body: Bytes::new(),
                })
            }
            _ => panic!("unexpected request: {} {}", req.method, path),
        }
    }
}

fn write_form(storage_dir: &Path, name: &str, id: &str, version: Option<&str>, encrypted: bool) {
    let form_dir = storage_dir.join("forms").join(name);
    std::fs::create_dir_all(&form_dir).unwrap();
    let version_attr = version
        .map(|v| format!(r#" version="{}""#, v))
        .unwrap_or_default();
    let key_attr = if encrypted {
        r#" base64RsaPublicKey="AAAB""#
    } else {
        ""
    };
    let def = format!(
        r#"<h:html><model><submission id="{}"{}{}/></model></h:html>"#,
        id, version_attr, key_attr
    );
    std::fs::write(form_dir.join(format!("{}.xml", name)), def).unwrap();
}

fn write_submission(storage_dir: &Path, form_name: &str, instance_id: &str, version: &str) {
    let instance_dir = storage_dir
        .join("forms")
        .join(form_name)
        .join("instances")
        .join(instance_id);
    std::fs::create_dir_all(&instance_dir).unwrap();
    let body = format!(
        r#"<data id="{}" version="{}" instanceID="{}"><a>1</a></data>"#,
        form_name, version, instance_id
    );
    std::fs::write(instance_dir.join("submission.xml"), body).unwrap();
}

fn target() -> PushTarget {
    PushTarget::Central(CentralServer::new(
        "https://central.example.org",
        1,
        Credentials::new("admin@example.org", "pw"),
    ))
}

fn pipeline(http: Arc<dyn Http>) -> (PushPipeline, mpsc::UnboundedReceiver<PushEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PushPipeline::new(http, tx), rx)
}

#[tokio::test]
async fn mixed_form_set_scenario() -> Result<()> {
    let storage = TmpDirGuard::create("formsync-scenario")?;
    // A: plain form, one submission version.
    write_form(&storage, "a", "a-id", Some("1"), false);
    write_submission(&storage, "a", "uuid-a1", "1");
    // B: encrypted.
    write_form(&storage, "b", "b-id", Some("1"), true);
    // C: plain, submissions for two versions; its uploads will hit a
    // simulated network failure.
    write_form(&storage, "c", "c-id", Some("2"), false);
    write_submission(&storage, "c", "uuid-c1", "1");
    write_submission(&storage, "c", "uuid-c2", "2");

    let server = Arc::new(FakeCentral::default());
    server.broken_forms.lock().unwrap().insert(String::from("c-id"));

    let forms = scan_forms(&storage)?;
    assert_eq!(forms.len(), 3);

    let (pipeline, mut events) = pipeline(server.clone());

    // Advisory names C only: it is the sole form with two local versions.
    let metadata = FsFormMetadata::at(storage.as_ref() as &Path);
    let warning = pipeline.push_warning(&metadata, &forms)?.expect("advisory");
    assert!(warning.contains("(c)"), "only c is multi-version: {}", warning);

    let runner = pipeline.push(&forms, &target(), &storage).await?;
    runner.wait().await;

    // Exactly the two unencrypted forms were attempted.
    let outcomes = runner.outcomes();
    assert_eq!(outcomes.len(), 2);
    assert!(
        outcomes
            .iter()
            .any(|(name, o)| name == "push a" && *o == JobOutcome::Completed)
    );
    assert!(
        outcomes
            .iter()
            .any(|(name, o)| name == "push c" && matches!(o, JobOutcome::Failed(_)))
    );

    // One completion event, regardless of C's failure.
    assert_eq!(events.recv().await, Some(PushEvent::Complete));
    assert!(events.try_recv().is_err());

    let by_name: Vec<(String, String)> = forms
        .iter()
        .map(|f| (f.name().to_string(), f.status_string()))
        .collect();
    for (name, status) in by_name {
        match name.as_str() {
            "a" => assert_eq!(status, "Success"),
            "b" => assert_eq!(status, "skipped: encryption unsupported"),
            "c" => assert!(status.starts_with("Failed:"), "got {:?}", status),
            other => panic!("unexpected form {}", other),
        }
    }

    // A's definition and submission made it over; the session was opened once.
    assert!(server.forms.lock().unwrap().contains("a-id"));
    assert!(
        server
            .submissions
            .lock()
            .unwrap()
            .contains(&(String::from("a-id"), String::from("uuid-a1")))
    );
    Ok(())
}

#[tokio::test]
async fn repeated_push_is_idempotent() -> Result<()> {
    let storage = TmpDirGuard::create("formsync-idem")?;
    write_form(&storage, "basic", "basic-id", Some("1"), false);
    write_submission(&storage, "basic", "uuid-1", "1");
    write_submission(&storage, "basic", "uuid-2", "1");

    let server = Arc::new(FakeCentral::default());

    let forms = scan_forms(&storage)?;
    let (first, mut first_events) = pipeline(server.clone());
    let runner = first.push(&forms, &target(), &storage).await?;
    runner.wait().await;
    assert_eq!(first_events.recv().await, Some(PushEvent::Complete));

    assert_eq!(*server.form_posts.lock().unwrap(), 1);
    assert_eq!(*server.submission_posts.lock().unwrap(), 2);
    let first_status = forms.iter().next().unwrap().status_string();
    assert_eq!(first_status, "Success");

    // Second invocation over the same storage: same final status, no new
    // uploads observable on the server.
    let forms = scan_forms(&storage)?;
    let (second, mut second_events) = pipeline(server.clone());
    let runner = second.push(&forms, &target(), &storage).await?;
    runner.wait().await;
    assert_eq!(second_events.recv().await, Some(PushEvent::Complete));

    assert_eq!(*server.form_posts.lock().unwrap(), 1, "definition not re-sent");
    assert_eq!(*server.submission_posts.lock().unwrap(), 2, "submissions not re-sent");
    assert_eq!(forms.iter().next().unwrap().status_string(), "Success");
    Ok(())
}

#[tokio::test]
async fn authentication_failure_reaches_no_form() -> Result<()> {
    let storage = TmpDirGuard::create("formsync-noauth")?;
    write_form(&storage, "basic", "basic-id", Some("1"), false);

    let server = Arc::new(FakeCentral {
        deny_sessions: true,
        ..FakeCentral::default()
    });

    let forms = scan_forms(&storage)?;
    let (pipeline, mut events) = pipeline(server.clone());
    let err = pipeline.push(&forms, &target(), &storage).await.unwrap_err();
    assert!(err.to_string().contains("Can't authenticate"));

    assert!(server.forms.lock().unwrap().is_empty());
    assert_eq!(forms.iter().next().unwrap().status_string(), "");
    assert!(events.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn cancelled_push_still_completes_with_terminal_states() -> Result<()> {
    let storage = TmpDirGuard::create("formsync-cancel")?;
    for i in 0..4 {
        let name = format!("f{}", i);
        write_form(&storage, &name, &format!("{}-id", name), Some("1"), false);
        for j in 0..10 {
            write_submission(&storage, &name, &format!("uuid-{}-{}", name, j), "1");
        }
    }

    let server = Arc::new(FakeCentral::default());
    let forms = scan_forms(&storage)?;
    let (pipeline, mut events) = pipeline(server.clone());

    let runner = pipeline.push(&forms, &target(), &storage).await?;
    runner.cancel();
    runner.wait().await;

    assert_eq!(events.recv().await, Some(PushEvent::Complete));
    let outcomes = runner.outcomes();
    assert_eq!(outcomes.len(), 4);
    for (_, outcome) in outcomes {
        assert!(
            matches!(outcome, JobOutcome::Cancelled | JobOutcome::Completed),
            "every job must end in a terminal state, got {:?}",
            outcome
        );
    }
    Ok(())
}
