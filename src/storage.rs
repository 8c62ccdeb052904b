use axum::body::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Post images kept on the local filesystem and served statically under `base_url`.
#[derive(Clone, Debug)]
pub struct LocalImageStorage {
    pub upload_dir: PathBuf,
    pub base_url: String,
}

impl LocalImageStorage {
    pub fn new(upload_dir: String, base_url: String) -> Self {
        Self {
            upload_dir: PathBuf::from(upload_dir),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Writes the image under a fresh name and returns the URL it is served at.
    pub async fn save_image(
        &self,
        file_bytes: Bytes,
        original_filename: Option<&str>,
    ) -> Result<String, std::io::Error> {
        let extension = original_filename
            .and_then(|name| Path::new(name).extension().and_then(|os_str| os_str.to_str()))
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();

        let unique_filename = format!("{}{}", Uuid::new_v4(), extension);
        let file_path = self.upload_dir.join(&unique_filename);

        fs::create_dir_all(&self.upload_dir).await?;
        fs::write(&file_path, file_bytes).await?;

        Ok(format!("{}/{}", self.base_url, unique_filename))
    }

    pub async fn delete_image(&self, image_url: &str) -> Result<(), std::io::Error> {
        let file_name = image_url
            .strip_prefix(&self.base_url)
            .unwrap_or(image_url)
            .trim_start_matches('/');
        // Only plain file names live in the upload dir.
        if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a stored image url: {}", image_url),
            ));
        }
        fs::remove_file(self.upload_dir.join(file_name)).await
    }
}
