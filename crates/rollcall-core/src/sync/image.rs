use std::path::{Path, PathBuf};

use tracing::debug;

use crate::api::ImageUpload;

/// A picked image, referenced by path, not yet prepared for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    path: PathBuf,
}

impl ImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy the picked image into a uniquely named temporary file under
    /// `dir` so it can be sent as a multipart part.
    pub async fn materialize(&self, dir: &Path) -> std::io::Result<ImageUpload> {
        tokio::fs::create_dir_all(dir).await?;

        let file_name = format!("img_{:016x}.jpg", rand::random::<u64>());
        // Owns the temp file from here on, so a failed or partial copy is removed
        let upload = ImageUpload {
            path: dir.join(&file_name),
            file_name,
        };
        let bytes = tokio::fs::copy(&self.path, &upload.path).await?;

        if bytes == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} is empty", self.path.display()),
            ));
        }

        debug!(source = ?self.path, temp = ?upload.path, bytes, "Image materialized for upload");
        Ok(upload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::sync::{Action, Cancelled};

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("rollcall-image-{:016x}", rand::random::<u64>()))
    }

    #[tokio::test]
    async fn test_materialize_copies_to_temp_file() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).expect("mkdir");
        let picked = dir.join("picked.png");
        std::fs::write(&picked, b"\x89PNG fake image").expect("write");

        let upload = ImageSource::new(&picked)
            .materialize(&dir.join("uploads"))
            .await
            .expect("materialize");
        assert!(upload.file_name.starts_with("img_"));
        assert!(upload.file_name.ends_with(".jpg"));
        assert_eq!(std::fs::read(&upload.path).expect("read"), b"\x89PNG fake image");

        let path = upload.path.clone();
        drop(upload);
        assert!(!path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_materialize_missing_or_empty_fails() {
        let dir = temp_dir();
        let missing = ImageSource::new(dir.join("does-not-exist.jpg"));
        assert!(missing.materialize(&dir).await.is_err());

        let empty = dir.join("empty.jpg");
        std::fs::write(&empty, b"").expect("write");
        let uploads = dir.join("uploads");
        assert!(ImageSource::new(&empty).materialize(&uploads).await.is_err());
        assert_eq!(std::fs::read_dir(&uploads).expect("uploads dir").count(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_cancelled_upload_removes_temp_file() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).expect("mkdir");
        let picked = dir.join("picked.jpg");
        std::fs::write(&picked, b"jpeg bytes").expect("write");
        let uploads = dir.join("uploads");

        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let task_uploads = uploads.clone();
        let action = Action::spawn(async move {
            let upload = ImageSource::new(picked)
                .materialize(&task_uploads)
                .await
                .expect("materialize");
            let _ = ready_tx.send(upload.path.clone());
            // Stands in for a slow multipart request
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(upload);
        });

        let temp = ready_rx.await.expect("upload prepared");
        assert!(temp.exists());

        action.cancel();
        assert_eq!(action.await, Err(Cancelled));
        assert!(!temp.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
