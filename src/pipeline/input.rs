//! Input resolution: load a user-supplied image path or URL into memory.
//!
//! Images are small enough (a phone photo of a question sheet is a few MB)
//! that they are read straight into a buffer. The only validation here is
//! that the bytes exist; format sniffing happens in
//! [`crate::pipeline::encode`].

use crate::error::ItemError;
use std::path::Path;
use tracing::{debug, info};

/// An image loaded into memory, with the name used in reports.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// File name (local) or last URL path segment (remote).
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the input as raw image bytes.
///
/// URLs are downloaded with `timeout_secs`; anything else is treated as a
/// local path.
pub async fn load_image(input: &str, timeout_secs: u64) -> Result<LoadedImage, ItemError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(Path::new(input)).await
    }
}

async fn load_local(path: &Path) -> Result<LoadedImage, ItemError> {
    let name = display_name(path);
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        let detail = match e.kind() {
            std::io::ErrorKind::NotFound => format!("file not found: {}", path.display()),
            std::io::ErrorKind::PermissionDenied => {
                format!("permission denied reading {}", path.display())
            }
            _ => e.to_string(),
        };
        ItemError::ImageLoad {
            source_name: name.clone(),
            detail,
        }
    })?;

    if bytes.is_empty() {
        return Err(ItemError::ImageLoad {
            source_name: name,
            detail: "file is empty".into(),
        });
    }

    debug!("Loaded local image: {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedImage { name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedImage, ItemError> {
    info!("Downloading image from: {}", url);
    let name = filename_from_url(url);
    let fail = |detail: String| ItemError::ImageLoad {
        source_name: name.clone(),
        detail,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            fail(format!("download timed out after {timeout_secs}s"))
        } else {
            fail(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(fail(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
    debug!("Downloaded {} bytes from {}", bytes.len(), url);

    Ok(LoadedImage {
        name,
        bytes: bytes.to_vec(),
    })
}

/// Name used for a local file in reports and batch matching.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded-image".to_string()
}
