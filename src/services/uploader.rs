//! File upload collaborator.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::AppError;

/// Stores an uploaded file somewhere reachable and returns its URL.
#[async_trait]
pub trait EvidenceUploader: Send + Sync {
    async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<String, AppError>;
}

/// Writes uploads to a local directory that is served under `public_url`.
pub struct LocalUploader {
    root: PathBuf,
    public_url: String,
}

impl LocalUploader {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into(),
        }
    }
}

#[async_trait]
impl EvidenceUploader for LocalUploader {
    async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<String, AppError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Upload(format!("create upload dir: {}", e)))?;

        let stored_name = format!("{}-{}", uuid::Uuid::new_v4(), sanitize_filename(filename));
        tokio::fs::write(self.root.join(&stored_name), bytes)
            .await
            .map_err(|e| AppError::Upload(format!("write {}: {}", stored_name, e)))?;

        tracing::debug!("Stored upload {} ({} bytes)", stored_name, bytes.len());
        Ok(format!("{}/{}", self.public_url, stored_name))
    }
}

/// Keep only characters that are safe in a file name and a URL path segment.
fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("receipt march.jpg"), "receipt_march.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[tokio::test]
    async fn test_local_uploader_writes_file() {
        let dir = TempDir::new().unwrap();
        let uploader = LocalUploader::new(dir.path().join("uploads"), "http://files.test");

        let url = uploader.upload("proof.png", b"png-bytes").await.unwrap();

        assert!(url.starts_with("http://files.test/"));
        assert!(url.ends_with("-proof.png"));
        let stored = url.rsplit('/').next().unwrap();
        let content = tokio::fs::read(dir.path().join("uploads").join(stored)).await.unwrap();
        assert_eq!(content, b"png-bytes");
    }
}
