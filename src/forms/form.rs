use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Identity of a form definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormKey {
    pub name: String,
    pub id: String,
    pub version: Option<String>,
}

impl FormKey {
    pub fn new(name: impl Into<String>, id: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            version,
        }
    }
}

/// A form selected for one transfer operation, carrying a mutable
/// human-readable status string.
///
/// During a push exactly one job writes a given form's status; the lock is
/// for the reader (UI/CLI) side.
#[derive(Debug)]
pub struct FormStatus {
    key: FormKey,
    encrypted: bool,
    form_file: PathBuf,
    status: RwLock<String>,
}

impl FormStatus {
    pub fn new(key: FormKey, encrypted: bool, form_file: PathBuf) -> Self {
        Self {
            key,
            encrypted,
            form_file,
            status: RwLock::new(String::new()),
        }
    }

    pub fn key(&self) -> &FormKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn form_file(&self) -> &Path {
        &self.form_file
    }

    pub fn set_status(&self, status: impl Into<String>) {
        *self.status.write().unwrap() = status.into();
    }

    pub fn status_string(&self) -> String {
        self.status.read().unwrap().clone()
    }
}
