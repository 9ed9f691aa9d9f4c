//! Image normalization for OCR
//!
//! Turns uploaded photos into bitmaps the recognition engines do well on,
//! with a profile per script type, plus a standalone quality analyzer.

pub mod pipeline;
pub mod quality;
pub mod steps;

pub use pipeline::{NormalizeOutcome, Pipeline, Profile};
pub use quality::{analyze, QualityLevel, QualityReport, Readiness};

use crate::error::OcrError;
use image::DynamicImage;

/// Decode raw upload bytes. The one fail-fast error in the pipeline:
/// undecodable bytes abort the request before any engine is invoked.
pub fn decode(data: &[u8]) -> Result<DynamicImage, OcrError> {
    image::load_from_memory(data).map_err(|e| OcrError::DecodeError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode(b"definitely not an image");
        assert!(matches!(result, Err(OcrError::DecodeError(_))));
    }

    #[test]
    fn test_decode_accepts_png() {
        let img = image::GrayImage::from_pixel(4, 4, image::Luma([200]));
        let mut bytes = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut bytes);
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut cursor, image::ImageFormat::Png)
            .unwrap();

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 4);
    }
}
