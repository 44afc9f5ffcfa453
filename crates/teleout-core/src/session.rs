use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{errors::Error, Result};

/// File-backed storage for the opaque session blob.
///
/// The transport decides what goes in the blob; this type only reads and
/// writes it. Writes go through a temp file + rename so a crash never leaves
/// a truncated session behind.
#[derive(Clone, Debug)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no session has been stored yet.
    pub fn load(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) if data.iter().all(u8::is_ascii_whitespace) => Ok(None),
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn store(&self, data: &[u8]) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| Error::InvalidPath {
            path: self.path.clone(),
            reason: "session path has no parent directory".to_string(),
        })?;
        fs::create_dir_all(parent)?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data)?;
        restrict_permissions(&tmp)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// The blob holds credentials.
fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    let _ = path;
    Ok(())
}
