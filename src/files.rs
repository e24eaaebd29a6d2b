// src/files.rs

use std::io;
use std::path::PathBuf;

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use log::info;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;

/// Write-once image storage. Files are stored under a uuid-prefixed,
/// space-stripped, lowercased name and referenced by that name from
/// package and profile records.
#[derive(Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn filename_for(suggested: &str) -> String {
        format!(
            "{}{}",
            Uuid::new_v4(),
            suggested.replace(' ', "").to_lowercase()
        )
    }

    // Stored names never contain separators; anything else is someone
    // probing the filesystem.
    fn safe_name(name: &str) -> Option<&str> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            None
        } else {
            Some(name)
        }
    }

    pub async fn store(&self, bytes: &[u8], suggested: &str) -> io::Result<String> {
        let name = Self::filename_for(suggested);
        tokio::fs::write(self.root.join(&name), bytes).await?;
        Ok(name)
    }

    pub async fn resolve(&self, name: &str) -> io::Result<Vec<u8>> {
        let name = Self::safe_name(name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid image name"))?;
        tokio::fs::read(self.root.join(name)).await
    }

    pub async fn exists(&self, name: &str) -> bool {
        match Self::safe_name(name) {
            Some(name) => tokio::fs::try_exists(self.root.join(name))
                .await
                .unwrap_or(false),
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub name: String,
}

/// POST /images?name=photo.jpg
/// Raw body upload; returns the stored reference to attach to a package
/// or profile.
pub async fn upload_image(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    if req.extensions().get::<String>().is_none() {
        return Err(ApiError::Unauthorized("No token provided".to_string()));
    }
    if body.is_empty() {
        return Err(ApiError::Validation("The image is empty".to_string()));
    }
    if query.name.trim().is_empty() {
        return Err(ApiError::Validation("Complete all fields".to_string()));
    }

    let stored = data.images.store(&body, &query.name).await?;
    info!("Image stored: {}", stored);
    Ok(HttpResponse::Ok().json(json!({ "image": stored })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> ImageStore {
        let dir = std::env::temp_dir().join(format!("encomienda-test-{}", Uuid::new_v4()));
        ImageStore::new(dir).unwrap()
    }

    #[test]
    fn filename_strips_spaces_and_lowercases() {
        let name = ImageStore::filename_for("My Photo.JPG");
        assert!(name.ends_with("myphoto.jpg"));
        assert!(!name.contains(' '));
    }

    #[tokio::test]
    async fn store_then_resolve_round_trips() {
        let store = temp_store();
        let name = store.store(b"bytes", "a b.png").await.unwrap();
        assert!(store.exists(&name).await);
        assert_eq!(store.resolve(&name).await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn resolve_rejects_path_traversal() {
        let store = temp_store();
        assert!(store.resolve("../etc/passwd").await.is_err());
        assert!(store.resolve("a/b.png").await.is_err());
        assert!(!store.exists("..").await);
    }

    #[tokio::test]
    async fn missing_image_does_not_exist() {
        let store = temp_store();
        assert!(!store.exists("nope.png").await);
        assert!(store.resolve("nope.png").await.is_err());
    }
}
