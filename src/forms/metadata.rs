use crate::err::Result;
use crate::forms::form::FormKey;
use crate::forms::{FORM_VERSION_RE, submission_files};
use crate::sync_error_with_source;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Read-only queries over locally stored form metadata. The pipeline uses
/// this for the pre-push versioning advisory only; it never blocks a push.
pub trait FormMetadataPort: Send + Sync {
    /// Distinct submission versions stored locally for the given form.
    fn submission_versions(&self, key: &FormKey) -> Result<BTreeSet<String>>;
}

/// Metadata port over the on-disk storage layout.
pub struct FsFormMetadata {
    storage_dir: PathBuf,
}

impl FsFormMetadata {
    pub fn at(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }
}

impl FormMetadataPort for FsFormMetadata {
    fn submission_versions(&self, key: &FormKey) -> Result<BTreeSet<String>> {
        let mut versions = BTreeSet::new();
        for submission in submission_files(&self.storage_dir, &key.name)? {
            let content = std::fs::read_to_string(&submission.path).map_err(|e| {
                sync_error_with_source!(e, "Can't read submission {:?}", submission.path)
            })?;
            if let Some(captures) = FORM_VERSION_RE.captures(&content) {
                versions.insert(captures[1].to_string());
            }
        }
        Ok(versions)
    }
}
