//! Uploaded files: profile pictures, assignment attachments, submissions.
//! Stored paths are relative (`{prefix}/{uuid}_{name}`) and kept on the record.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

pub const PROFILE_PICTURES: &str = "profiles";
pub const ASSIGNMENT_ATTACHMENTS: &str = "assignments";
pub const SUBMISSION_FILES: &str = "submissions";

/// A file received in a multipart form, buffered in memory until validation passes.
#[derive(Clone, Debug)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `prefix` and return the relative path.
    async fn put(&self, prefix: &str, filename: &str, bytes: &[u8]) -> io::Result<String>;
    /// Remove a stored file. Missing files are not an error.
    async fn delete(&self, path: &str) -> io::Result<()>;
}

/// Files under a local media root.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalBlobStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        if path.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("bad media path: {}", path)));
        }
        Ok(self.root.join(path))
    }
}

/// Keep letters, digits, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, prefix: &str, filename: &str, bytes: &[u8]) -> io::Result<String> {
        let relative = format!("{}/{}_{}", prefix, uuid::Uuid::new_v4().simple(), sanitize_filename(filename));
        let target = self.resolve(&relative)?;
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!(path = %relative, size = bytes.len(), "stored upload");
        Ok(relative)
    }

    async fn delete(&self, path: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.resolve(path)?).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("essay final.pdf"), "essay_final.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\hw.docx"), "hw.docx");
        assert_eq!(sanitize_filename(".."), "upload");
    }

    #[tokio::test]
    async fn put_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = LocalBlobStore::new(dir.path());
        let path = blobs.put(SUBMISSION_FILES, "work.txt", b"answer").await.unwrap();
        assert!(path.starts_with("submissions/"));
        assert!(path.ends_with("_work.txt"));
        let on_disk = dir.path().join(&path);
        assert_eq!(tokio::fs::read(&on_disk).await.unwrap(), b"answer");
        blobs.delete(&path).await.unwrap();
        assert!(!on_disk.exists());
        blobs.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = LocalBlobStore::new(dir.path());
        assert!(blobs.delete("../outside.txt").await.is_err());
    }
}
