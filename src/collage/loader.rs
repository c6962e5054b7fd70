use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbaImage;
use log::{debug, warn};
use tokio::task::JoinSet;

use crate::card::{ImageRef, CELL_COUNT};

/// Outcome of resolving one image reference. Never an error: an unavailable
/// image is rendered as a placeholder.
#[derive(Debug)]
pub enum LoadedImage {
    Decoded(RgbaImage),
    Unavailable(Unavailable),
}

impl LoadedImage {
    pub fn bitmap(&self) -> Option<&RgbaImage> {
        match self {
            LoadedImage::Decoded(image) => Some(image),
            LoadedImage::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unavailable {
    #[error("no image")]
    Absent,
    #[error("malformed data URL: {0}")]
    InvalidDataUrl(String),
    #[error("failed to fetch {0}")]
    FetchFailed(String),
    #[error("failed to decode image: {0}")]
    DecodeFailed(String),
}

/// Resolves and decodes an image reference. An absent reference returns
/// immediately without touching the decoder.
pub async fn load(reference: Option<&ImageRef>) -> LoadedImage {
    let Some(reference) = reference else {
        return LoadedImage::Unavailable(Unavailable::Absent);
    };

    let bytes = match read_bytes(reference).await {
        Ok(bytes) => bytes,
        Err(reason) => return LoadedImage::Unavailable(reason),
    };

    let decoded = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes).map(|image| image.to_rgba8())
    })
    .await;

    match decoded {
        Ok(Ok(image)) => {
            debug!(
                "Decoded {} ({}x{})",
                reference,
                image.width(),
                image.height()
            );
            LoadedImage::Decoded(image)
        }
        Ok(Err(e)) => LoadedImage::Unavailable(Unavailable::DecodeFailed(e.to_string())),
        Err(e) => LoadedImage::Unavailable(Unavailable::DecodeFailed(e.to_string())),
    }
}

/// Loads every cell concurrently and returns the outcomes in cell order.
/// Completion order does not matter; each result is placed by its index.
pub async fn load_cells(references: Vec<Option<ImageRef>>) -> Vec<LoadedImage> {
    let mut tasks = JoinSet::new();
    for (index, reference) in references.into_iter().enumerate().take(CELL_COUNT) {
        tasks.spawn(async move { (index, load(reference.as_ref()).await) });
    }

    let mut cells: Vec<LoadedImage> = (0..CELL_COUNT)
        .map(|_| LoadedImage::Unavailable(Unavailable::Absent))
        .collect();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, loaded)) => {
                if let LoadedImage::Unavailable(reason) = &loaded {
                    if *reason != Unavailable::Absent {
                        warn!("Cell {} rendered as placeholder: {}", index, reason);
                    }
                }
                cells[index] = loaded;
            }
            Err(e) => warn!("Image load task failed: {}", e),
        }
    }

    cells
}

async fn read_bytes(reference: &ImageRef) -> Result<Vec<u8>, Unavailable> {
    match reference {
        ImageRef::DataUrl(url) => decode_data_url(url),
        ImageRef::Locator(locator) => {
            let lower = locator.to_ascii_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                let url = locator.clone();
                tokio::task::spawn_blocking(move || fetch_remote(&url))
                    .await
                    .map_err(|e| Unavailable::FetchFailed(e.to_string()))?
            } else {
                let path = locator.strip_prefix("file://").unwrap_or(locator);
                tokio::fs::read(path).await.map_err(|e| {
                    Unavailable::FetchFailed(format!("{}: {}", path, e))
                })
            }
        }
    }
}

fn fetch_remote(url: &str) -> Result<Vec<u8>, Unavailable> {
    let mut response = ureq::get(url)
        .call()
        .map_err(|e| Unavailable::FetchFailed(format!("{}: {}", url, e)))?;

    response
        .body_mut()
        .read_to_vec()
        .map_err(|e| Unavailable::FetchFailed(format!("{}: {}", url, e)))
}

/// Decodes the payload of a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, Unavailable> {
    let (header, payload) = url
        .split_once(',')
        .ok_or_else(|| Unavailable::InvalidDataUrl("missing ',' separator".to_string()))?;

    if !header.to_ascii_lowercase().ends_with(";base64") {
        return Err(Unavailable::InvalidDataUrl(
            "only base64 payloads are supported".to_string(),
        ));
    }

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Unavailable::InvalidDataUrl(e.to_string()))
}

/// Encodes bytes as a base64 `data:` URL.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}
