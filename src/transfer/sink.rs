use std::path::{Path, PathBuf};

use tokio::fs::File;

use crate::error::ProtocolError;

/// Destination directory for received files.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory (and parents) if it does not exist yet.
    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Path a client-supplied name maps to inside the directory.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ProtocolError> {
        Ok(self.root.join(sanitize_filename(name)?))
    }

    /// Open `path` for writing, truncating any earlier file of the same name.
    pub async fn create(&self, path: &Path) -> std::io::Result<File> {
        self.ensure().await?;
        File::create(path).await
    }
}

/// Reduce a client-supplied name to a single path component.
///
/// Directory parts (either separator) are dropped so a name can never
/// escape the upload directory.
pub fn sanitize_filename(name: &str) -> Result<String, ProtocolError> {
    if name.contains('\0') {
        return Err(ProtocolError::InvalidFilename(name.to_string()));
    }
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(ProtocolError::InvalidFilename(name.to_string()));
    }
    Ok(base.to_string())
}
