use crate::constants::{FORMS_DIR, INSTANCES_DIR};
use crate::err::Result;
use crate::global_var::LOGGER;
use crate::sync_error_with_source;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

mod form;
mod metadata;
mod transfer_forms;

pub use form::{FormKey, FormStatus};
pub use metadata::{FormMetadataPort, FsFormMetadata};
pub use transfer_forms::TransferForms;

static FORM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bid="([^"]+)""#).expect("form id pattern"));
static FORM_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bversion="([^"]+)""#).expect("form version pattern"));
static SUBMISSION_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<submission\b[^>]*>").expect("submission tag pattern"));

/// Marker attribute present in the definition of encrypted forms.
const ENCRYPTION_MARKER: &str = "base64RsaPublicKey";

/// One locally stored submission of a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFile {
    pub instance_id: String,
    pub path: PathBuf,
}

/// Discover the forms stored under `{storage_dir}/forms`, sorted by name.
///
/// A form lives at `forms/{name}/{name}.xml`; directories without a matching
/// definition file are skipped with a warning.
pub fn scan_forms(storage_dir: &Path) -> Result<TransferForms> {
    let forms_dir = storage_dir.join(FORMS_DIR);
    if !forms_dir.is_dir() {
        return Ok(TransferForms::empty());
    }

    let mut names: Vec<String> = Vec::new();
    for entry in std::fs::read_dir(&forms_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();

    let mut forms = Vec::new();
    for name in names {
        let form_file = forms_dir.join(&name).join(format!("{}.xml", &name));
        if !form_file.is_file() {
            LOGGER.warn(format!(
                "Skipping {:?}: no form definition found",
                forms_dir.join(&name)
            ));
            continue;
        }
        let def = std::fs::read_to_string(&form_file)
            .map_err(|e| sync_error_with_source!(e, "Can't read form definition {:?}", form_file))?;
        // The id/version attributes live on the submission element; other
        // elements may carry unrelated id attributes of their own.
        let scope = SUBMISSION_TAG_RE
            .find(&def)
            .map(|m| m.as_str())
            .unwrap_or(&def);
        let id = FORM_ID_RE
            .captures(scope)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| name.clone());
        let version = FORM_VERSION_RE.captures(scope).map(|c| c[1].to_string());
        let encrypted = def.contains(ENCRYPTION_MARKER);
        forms.push(Arc::new(FormStatus::new(
            FormKey::new(name, id, version),
            encrypted,
            form_file,
        )));
    }

    Ok(TransferForms::from(forms))
}

/// The submissions stored locally for a form, sorted by instance id.
pub fn submission_files(storage_dir: &Path, form_name: &str) -> Result<Vec<SubmissionFile>> {
    let instances_dir = storage_dir.join(FORMS_DIR).join(form_name).join(INSTANCES_DIR);
    if !instances_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut submissions = Vec::new();
    for entry in std::fs::read_dir(&instances_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path().join("submission.xml");
        if path.is_file() {
            submissions.push(SubmissionFile {
                instance_id: entry.file_name().to_string_lossy().into_owned(),
                path,
            });
        }
    }
    submissions.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
    Ok(submissions)
}
