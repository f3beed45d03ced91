use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::error::PipelineError;

pub const PNG_CONTENT_TYPE: &str = "image/png";
pub const MP4_CONTENT_TYPE: &str = "video/mp4";

/// Unwraps an upstream payload into raw image bytes. Payloads are usually a
/// base64 body (optionally a `data:` URL); bytes that already carry an image
/// signature pass through untouched.
pub fn unwrap_payload(payload: &[u8]) -> Result<Vec<u8>, PipelineError> {
    if detect_mime_type(payload).is_some() {
        return Ok(payload.to_vec());
    }
    let text = std::str::from_utf8(payload)
        .map_err(|_| PipelineError::Decode("payload is neither an image nor base64 text".into()))?;
    let text = text.trim().trim_matches('"');
    let encoded = match text.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => text,
    };
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| PipelineError::Decode(format!("invalid base64 payload: {err}")))
}

/// Decodes an upstream payload and re-encodes it as an RGB PNG.
pub fn transcode_to_png(payload: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let bytes = unwrap_payload(payload)?;
    let image = decode(&bytes)?;
    encode_png(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Resizes an encoded image to exactly `width` x `height` and re-encodes it as
/// an RGB PNG.
pub fn resize_to_png(bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PipelineError> {
    let image = decode(bytes)?;
    let resized = image.resize_exact(width, height, FilterType::Lanczos3);
    encode_png(DynamicImage::ImageRgb8(resized.to_rgb8()))
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    let format = match detect_mime_type(bytes) {
        Some(mime_type) => mime_to_format(mime_type)?,
        None => image::guess_format(bytes)
            .map_err(|err| PipelineError::Decode(format!("unrecognized image format: {err}")))?,
    };
    image::load_from_memory_with_format(bytes, format)
        .map_err(|err| PipelineError::Decode(format!("decode image failed: {err}")))
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>, PipelineError> {
    let mut output = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|err| PipelineError::Decode(format!("encode png failed: {err}")))?;
    Ok(output)
}

pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"BM") {
        return Some("image/bmp");
    }
    None
}

pub fn mime_to_format(mime_type: &str) -> Result<ImageFormat, PipelineError> {
    match mime_type {
        "image/png" => Ok(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Ok(ImageFormat::Jpeg),
        "image/gif" => Ok(ImageFormat::Gif),
        "image/webp" => Ok(ImageFormat::WebP),
        "image/bmp" => Ok(ImageFormat::Bmp),
        _ => Err(PipelineError::Decode(format!(
            "unsupported mime type: {mime_type}"
        ))),
    }
}
