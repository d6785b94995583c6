use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid media path: {0}")]
    InvalidPath(String),
    #[error("Payload is not valid base64")]
    InvalidEncoding,
    #[error("Unsupported image format")]
    UnsupportedImage,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage for user-uploaded files
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores `bytes` at `relative_path`, replacing any existing file.
    async fn save(&self, relative_path: &str, bytes: &[u8]) -> Result<(), MediaError>;

    /// Public URL of a stored file
    fn url_for(&self, relative_path: &str) -> String;
}

/// Files under a local directory, served by the HTTP layer at `base_url`
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf, MediaError> {
        let rel = Path::new(relative_path);
        let safe = !relative_path.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(MediaError::InvalidPath(relative_path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn save(&self, relative_path: &str, bytes: &[u8]) -> Result<(), MediaError> {
        let path = self.resolve(relative_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), "Stored media file");
        Ok(())
    }

    fn url_for(&self, relative_path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            relative_path.trim_start_matches('/')
        )
    }
}

/// Image bytes decoded from an upload payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// Decodes a base64 image, optionally wrapped as a `data:` URL.
pub fn decode_image(payload: &str) -> Result<DecodedImage, MediaError> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|_| MediaError::InvalidEncoding)?;
    let extension = sniff_image(&bytes).ok_or(MediaError::UnsupportedImage)?;
    Ok(DecodedImage { bytes, extension })
}

fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}
