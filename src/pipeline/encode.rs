//! Image encoding: raw image bytes → base64 `ImageData` for the VLM request.
//!
//! VLM APIs accept images as base64 data-URIs embedded in the JSON request
//! body. Uploaded bytes are passed through untouched whenever possible;
//! only images larger than the configured dimension cap are decoded,
//! downscaled and re-encoded as PNG (lossless, so small print survives).
//! `detail: "high"` asks GPT-4-class models to use the full tile budget,
//! without which option letters and subscripts get lost.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unsupported image format (first bytes: {magic:02x?})")]
    Unsupported { magic: Vec<u8> },

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Encode uploaded image bytes for the VLM API.
///
/// PNG, JPEG, GIF and WebP are accepted. PNG and JPEG images whose longer
/// side exceeds `max_dimension` are downscaled first; `0` disables the cap.
pub fn encode_image(bytes: &[u8], max_dimension: u32) -> Result<ImageData, EncodeError> {
    let format = image::guess_format(bytes).map_err(|_| EncodeError::Unsupported {
        magic: bytes.iter().take(8).copied().collect(),
    })?;
    let mime = mime_type(format).ok_or_else(|| EncodeError::Unsupported {
        magic: bytes.iter().take(8).copied().collect(),
    })?;

    if max_dimension > 0 && matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
        let (width, height) =
            ImageReader::with_format(Cursor::new(bytes), format).into_dimensions()?;
        if width.max(height) > max_dimension {
            debug!(
                "Downscaling {}x{} image to fit {}px",
                width, height, max_dimension
            );
            let img = image::load_from_memory_with_format(bytes, format)?;
            let resized = img.resize(max_dimension, max_dimension, FilterType::Triangle);
            return Ok(encode_png(&resized)?);
        }
    }

    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} image → {} bytes base64", mime, b64.len());
    Ok(ImageData::new(b64, mime).with_detail("high"))
}

/// PNG-encode a decoded image.
pub fn encode_png(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Inline `data:` URI for an encoded image.
pub fn data_uri(image: &ImageData) -> String {
    format!("data:{};base64,{}", image.mime_type, image.data)
}

fn mime_type(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn small_png_passes_through() {
        let bytes = png_bytes(10, 10);
        let data = encode_image(&bytes, 2000).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn oversized_png_is_downscaled() {
        let bytes = png_bytes(400, 100);
        let data = encode_image(&bytes, 200).unwrap();
        let decoded = STANDARD.decode(&data.data).unwrap();
        let img = image::load_from_memory(&decoded).unwrap();
        assert_eq!(img.width(), 200);
        assert_eq!(img.height(), 50);
    }

    #[test]
    fn non_image_is_rejected() {
        let err = encode_image(b"%PDF-1.7 not an image", 0).unwrap_err();
        assert!(matches!(err, EncodeError::Unsupported { .. }));
    }

    #[test]
    fn data_uri_has_mime_prefix() {
        let data = encode_image(&png_bytes(2, 2), 0).unwrap();
        let uri = data_uri(&data);
        assert!(uri.starts_with("data:image/png;base64,"));
        assert!(uri.ends_with(&data.data));
    }
}
