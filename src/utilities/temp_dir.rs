use crate::global_var::LOGGER;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Removes the wrapped directory tree on drop. Used by filesystem tests to
/// build throwaway storage directories.
#[derive(Debug)]
pub struct TmpDirGuard(pub PathBuf);

impl TmpDirGuard {
    /// Create a fresh unique directory under the system temp dir.
    pub fn create(prefix: &str) -> std::io::Result<Self> {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("{}-{}-{}", prefix, std::process::id(), nanos));
        std::fs::create_dir_all(&path)?;
        Ok(Self(path))
    }
}

impl Drop for TmpDirGuard {
    fn drop(&mut self) {
        LOGGER.trace(format!(
            "TmpDirGuard dropping, removing temporary directory: {:?}",
            &self.0
        ));
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

impl From<PathBuf> for TmpDirGuard {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl AsRef<Path> for TmpDirGuard {
    fn as_ref(&self) -> &Path {
        self.0.as_path()
    }
}

impl Deref for TmpDirGuard {
    type Target = PathBuf;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
