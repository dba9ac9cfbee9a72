// ABOUTME: Image optimization used by the background job runner
// ABOUTME: Decodes an upload, downscales it to the configured width and re-encodes it

use std::io::Cursor;

use image::imageops::FilterType;
use image::DynamicImage;

use super::ImageKind;
use crate::errors::{AppError, AppResult};

/// Result of optimizing one image
#[derive(Debug, Clone)]
pub struct OptimizedImage {
    /// Encoded bytes in the original format
    pub bytes: Vec<u8>,
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
}

/// Decode, shrink to at most `max_width` pixels wide and re-encode
///
/// CPU bound; call it from `spawn_blocking`.
///
/// # Errors
///
/// Returns `INVALID_FORMAT` if the bytes do not decode and `INTERNAL_ERROR`
/// if encoding fails
pub fn optimize(bytes: &[u8], kind: ImageKind, max_width: u32) -> AppResult<OptimizedImage> {
    let decoded = image::load_from_memory_with_format(bytes, kind.format()).map_err(|e| {
        AppError::new(
            crate::errors::ErrorCode::InvalidFormat,
            format!("Cannot decode {} image: {e}", kind.extension()),
        )
    })?;

    let resized = if decoded.width() > max_width && max_width > 0 {
        let height = scaled_height(decoded.width(), decoded.height(), max_width);
        decoded.resize_exact(max_width, height, FilterType::Lanczos3)
    } else {
        decoded
    };

    // JPEG has no alpha channel
    let encodable = match kind {
        ImageKind::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        ImageKind::Webp => DynamicImage::ImageRgba8(resized.to_rgba8()),
        ImageKind::Png | ImageKind::Gif => resized,
    };

    let mut out = Cursor::new(Vec::new());
    encodable
        .write_to(&mut out, kind.format())
        .map_err(|e| AppError::internal(format!("Cannot encode optimized image: {e}")))?;

    Ok(OptimizedImage {
        bytes: out.into_inner(),
        width: encodable.width(),
        height: encodable.height(),
    })
}

fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scaled = u64::from(height) * u64::from(target_width) / u64::from(width.max(1));
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_wide_image_is_downscaled() {
        let optimized = optimize(&png(400, 200), ImageKind::Png, 100).unwrap();
        assert_eq!((optimized.width, optimized.height), (100, 50));
        assert_eq!(ImageKind::sniff(&optimized.bytes), Some(ImageKind::Png));
    }

    #[test]
    fn test_narrow_image_keeps_size() {
        let optimized = optimize(&png(40, 30), ImageKind::Png, 100).unwrap();
        assert_eq!((optimized.width, optimized.height), (40, 30));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(optimize(b"\x89PNG\r\n\x1a\nbroken", ImageKind::Png, 100).is_err());
    }

    #[test]
    fn test_scaled_height_never_zero() {
        assert_eq!(scaled_height(10_000, 1, 100), 1);
    }
}
