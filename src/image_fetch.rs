//! Download an image URL into a per-request temporary file and decode it.
//!
//! The temporary file lives inside [`FetchedImage`]; it is deleted when that
//! value is closed or dropped, so every exit path of a request cleans up.

use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use reqwest::redirect::{Attempt, Policy};
use reqwest::{Client, StatusCode, Url};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::debug;

use crate::config::AppConfig;
use crate::model_client::ImageBuffer;

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("invalid image url: {0}")]
    InvalidUrl(String),

    #[error("could not build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("could not retrieve image: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("image host responded with {0}")]
    Status(StatusCode),

    #[error("image is larger than {0} bytes")]
    TooLarge(u64),

    #[error("could not store image locally: {0}")]
    Io(#[from] io::Error),

    #[error("not a valid image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("image decoder failed: {0}")]
    DecodeTask(#[source] JoinError),
}

/// A downloaded, decoded image backed by a temporary file.
#[derive(Debug)]
pub struct FetchedImage {
    file: NamedTempFile,
    image: ImageBuffer,
}

impl FetchedImage {
    pub fn image(&self) -> &ImageBuffer {
        &self.image
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the backing file now. Dropping does the same but ignores errors.
    pub fn close(self) -> io::Result<()> {
        self.file.close()
    }
}

pub struct ImageFetcher {
    http: Client,
    temp_dir: PathBuf,
    max_bytes: u64,
}

impl ImageFetcher {
    pub fn new(config: &AppConfig) -> Result<Self, ImageError> {
        std::fs::create_dir_all(&config.temp_dir)?;

        let http = Client::builder()
            .redirect(Policy::custom(follow_http_only))
            .build()
            .map_err(ImageError::Client)?;

        Ok(Self {
            http,
            temp_dir: config.temp_dir.clone(),
            max_bytes: config.max_image_bytes,
        })
    }

    /// Accepts absolute `http`/`https` URLs only.
    pub fn parse_url(raw: &str) -> Result<Url, ImageError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| ImageError::InvalidUrl(format!("`{}`: {e}", raw.trim())))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ImageError::InvalidUrl(format!("unsupported scheme `{other}`"))),
        }
    }

    pub async fn fetch(&self, url: &Url) -> Result<FetchedImage, ImageError> {
        let mut file = tempfile::Builder::new()
            .prefix("genai-image-")
            .tempfile_in(&self.temp_dir)?;

        let mut response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(ImageError::Unreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status(status));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(ImageError::TooLarge(self.max_bytes));
        }

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(ImageError::Unreachable)? {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(ImageError::TooLarge(self.max_bytes));
            }
            file.write_all(&chunk)?;
        }
        file.flush()?;

        debug!(
            url = %url,
            bytes = written,
            path = %file.path().display(),
            "image downloaded"
        );

        let (file, decoded) = tokio::task::spawn_blocking(move || {
            let decoded = decode_file(file.path());
            (file, decoded)
        })
        .await
        .map_err(ImageError::DecodeTask)?;

        let image = decoded?;
        Ok(FetchedImage { file, image })
    }
}

fn follow_http_only(attempt: Attempt) -> reqwest::redirect::Action {
    if attempt.previous().len() >= MAX_REDIRECTS {
        return attempt.error("too many redirects");
    }
    match attempt.url().scheme() {
        "http" | "https" => attempt.follow(),
        other => {
            let msg = format!("redirect to unsupported scheme `{other}`");
            attempt.error(msg)
        }
    }
}

/// Formats the provider accepts as-is; anything else is re-encoded to PNG.
fn inline_mime_type(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

fn decode_file(path: &Path) -> Result<ImageBuffer, ImageError> {
    let bytes = std::fs::read(path)?;
    let format = image::guess_format(&bytes).map_err(ImageError::Decode)?;
    let decoded =
        image::load_from_memory_with_format(&bytes, format).map_err(ImageError::Decode)?;

    if let Some(mime_type) = inline_mime_type(format) {
        return Ok(ImageBuffer {
            mime_type: mime_type.to_string(),
            bytes,
        });
    }

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(decoded.to_rgba8())
        .write_to(&mut png, ImageFormat::Png)
        .map_err(ImageError::Decode)?;

    Ok(ImageBuffer {
        mime_type: "image/png".to_string(),
        bytes: png.into_inner(),
    })
}
