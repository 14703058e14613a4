//! Image preprocessing for prediction requests.
//!
//! Uploads are decoded, scaled down to fit 800x600 with their aspect ratio
//! kept, and re-encoded as JPEG at quality 70. One shot, no retry.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError};

/// Maximum output width in pixels.
pub const MAX_WIDTH: u32 = 800;
/// Maximum output height in pixels.
pub const MAX_HEIGHT: u32 = 600;
/// JPEG quality factor (0.7).
pub const JPEG_QUALITY: u8 = 70;

/// A rescaled, JPEG-encoded image ready to upload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreparedImage {
    /// Encoded JPEG bytes.
    pub bytes: Vec<u8>,
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Upload file name, always with a `.jpg` extension.
    pub file_name: String,
}

impl PreparedImage {
    /// MIME type of every prepared image.
    pub const CONTENT_TYPE: &'static str = "image/jpeg";
}

/// Compute the largest size inside `max_width` x `max_height` with the same
/// aspect ratio. Sizes already inside the bounds are returned unchanged.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_const_for_fn
)]
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || (width <= max_width && height <= max_height) {
        return (width, height);
    }

    let scale = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let scaled_width = (f64::from(width) * scale).round() as u32;
    let scaled_height = (f64::from(height) * scale).round() as u32;

    (
        scaled_width.clamp(1, max_width),
        scaled_height.clamp(1, max_height),
    )
}

/// Decode `bytes`, fit the image inside 800x600 and encode it as JPEG.
///
/// # Errors
/// Returns an error if the input cannot be decoded or the output cannot be encoded.
pub fn rescale_to_jpeg(bytes: &[u8], file_name: &str) -> Result<PreparedImage, ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let (width, height) = fit_within(decoded.width(), decoded.height(), MAX_WIDTH, MAX_HEIGHT);

    let resized = if (width, height) == (decoded.width(), decoded.height()) {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::Triangle)
    };

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))?;

    Ok(PreparedImage {
        bytes: out,
        width,
        height,
        file_name: jpeg_file_name(file_name),
    })
}

fn jpeg_file_name(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("upload");
    format!("{stem}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn assert_ratio_kept(original: (u32, u32), scaled: (u32, u32)) {
        let before = f64::from(original.0) / f64::from(original.1);
        let after = f64::from(scaled.0) / f64::from(scaled.1);
        // One pixel of rounding on the short side.
        let tolerance = before / f64::from(scaled.1.min(scaled.0));
        assert!((before - after).abs() <= tolerance, "{before} vs {after}");
    }

    #[test]
    fn test_fit_landscape() {
        assert_eq!(fit_within(1600, 900, MAX_WIDTH, MAX_HEIGHT), (800, 450));
    }

    #[test]
    fn test_fit_portrait() {
        assert_eq!(fit_within(900, 1800, MAX_WIDTH, MAX_HEIGHT), (300, 600));
    }

    #[test]
    fn test_fit_wide_but_tall_landscape_respects_height() {
        let scaled = fit_within(1000, 900, MAX_WIDTH, MAX_HEIGHT);
        assert_eq!(scaled, (667, 600));
        assert_ratio_kept((1000, 900), scaled);
    }

    #[test]
    fn test_fit_small_image_unchanged() {
        assert_eq!(fit_within(120, 80, MAX_WIDTH, MAX_HEIGHT), (120, 80));
    }

    #[test]
    fn test_fit_extreme_ratio_keeps_one_pixel() {
        assert_eq!(fit_within(10_000, 1, MAX_WIDTH, MAX_HEIGHT), (800, 1));
    }

    #[test]
    fn test_fit_bounds_hold_across_sizes() {
        for (w, h) in [(801, 601), (4032, 3024), (3024, 4032), (640, 2000), (2500, 590)] {
            let (sw, sh) = fit_within(w, h, MAX_WIDTH, MAX_HEIGHT);
            assert!(sw <= MAX_WIDTH && sh <= MAX_HEIGHT, "{w}x{h} -> {sw}x{sh}");
            assert_ratio_kept((w, h), (sw, sh));
        }
    }

    #[test]
    fn test_rescale_outputs_jpeg_within_bounds() {
        let prepared = rescale_to_jpeg(&png_bytes(1600, 1200), "rash.png").unwrap();

        assert_eq!((prepared.width, prepared.height), (800, 600));
        assert_eq!(prepared.file_name, "rash.jpg");
        assert_eq!(
            image::guess_format(&prepared.bytes).unwrap(),
            ImageFormat::Jpeg
        );

        let decoded = image::load_from_memory(&prepared.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 600));
    }

    #[test]
    fn test_rescale_small_image_is_reencoded() {
        let prepared = rescale_to_jpeg(&png_bytes(40, 30), "").unwrap();
        assert_eq!((prepared.width, prepared.height), (40, 30));
        assert_eq!(prepared.file_name, "upload.jpg");
        assert_eq!(
            image::guess_format(&prepared.bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_rescale_rejects_garbage() {
        assert!(rescale_to_jpeg(b"definitely not an image", "x.png").is_err());
    }
}
