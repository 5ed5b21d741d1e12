//! Photo handling: upload validation, normalization, storage
//!
//! Validation gates both the declared file extension and the declared
//! content type against the image allow-set before anything touches disk
//! or the network. Normalization caps width at 800px (aspect preserved)
//! and re-encodes as JPEG quality 80.

pub mod store;

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};

use crate::types::{JarError, Result};

pub use store::{FilesystemStore, PhotoStore, S3Store};

/// Allowed photo extensions and content-type suffixes
const ALLOWED_TYPES: [&str; 4] = ["jpeg", "jpg", "png", "gif"];

/// Normalization policy: widest stored photo, in pixels
pub const MAX_WIDTH: u32 = 800;

/// Normalization policy: JPEG encode quality
pub const JPEG_QUALITY: u8 = 80;

/// An uploaded photo as received from the transport layer
#[derive(Debug, Clone)]
pub struct UploadedPhoto {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Check a photo's declared extension and content type against the
/// allow-set. Both must match.
pub fn photo_allowed(file_name: &str, content_type: &str) -> bool {
    let ext_ok = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_TYPES.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    let mime_ok = ALLOWED_TYPES
        .iter()
        .any(|t| content_type.to_ascii_lowercase() == format!("image/{}", t));

    ext_ok && mime_ok
}

/// Strip a file name down to characters safe for storage keys and paths
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        "photo".to_string()
    } else {
        cleaned
    }
}

/// Swap a file name's extension for `.jpg` after normalization
pub fn jpeg_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{}.jpg", stem),
        _ => format!("{}.jpg", file_name),
    }
}

/// Resize to at most [`MAX_WIDTH`] wide (aspect preserved) and re-encode
/// as JPEG at [`JPEG_QUALITY`]. The output is always JPEG regardless of
/// the input format.
pub fn normalize(data: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(data)
        .map_err(|e| JarError::Image(format!("failed to decode upload: {}", e)))?;

    let img = if img.width() > MAX_WIDTH {
        img.resize(MAX_WIDTH, u32::MAX, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel; flatten whatever came in.
    let img = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buff = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buff, JPEG_QUALITY);
    img.write_with_encoder(encoder)
        .map_err(|e| JarError::Image(format!("failed to encode JPEG: {}", e)))?;

    Ok(buff.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }));
        let mut buff = Cursor::new(Vec::new());
        img.write_to(&mut buff, image::ImageFormat::Png).unwrap();
        buff.into_inner()
    }

    #[test]
    fn test_allow_set_requires_both_matches() {
        assert!(photo_allowed("cookie.jpg", "image/jpeg"));
        assert!(photo_allowed("cookie.PNG", "image/png"));
        assert!(photo_allowed("cookie.gif", "image/gif"));

        // Extension mismatch
        assert!(!photo_allowed("notes.txt", "image/png"));
        // Content-type mismatch
        assert!(!photo_allowed("cookie.png", "text/plain"));
        // No extension at all
        assert!(!photo_allowed("cookie", "image/png"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my cookie pic!.jpg"), "my_cookie_pic_.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("???"), "photo");
        assert_eq!(sanitize_file_name("plain.png"), "plain.png");
    }

    #[test]
    fn test_jpeg_name() {
        assert_eq!(jpeg_name("cookie.png"), "cookie.jpg");
        assert_eq!(jpeg_name("cookie"), "cookie.jpg");
        assert_eq!(jpeg_name(".hidden"), ".hidden.jpg");
    }

    #[test]
    fn test_normalize_caps_width() {
        let out = normalize(&png_bytes(1600, 1200)).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.dimensions(), (800, 600));
        assert_eq!(
            image::guess_format(&out).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_normalize_keeps_small_images() {
        let out = normalize(&png_bytes(400, 300)).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.dimensions(), (400, 300));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(
            normalize(b"definitely not an image"),
            Err(JarError::Image(_))
        ));
    }
}
