use crate::error::OcrError;
use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Constrain image to the profile's maximum dimensions, preserving aspect
/// ratio. Only ever downscales: a photo already inside the bounds passes
/// through untouched.
pub fn apply(image: &DynamicImage, max_width: u32, max_height: u32) -> Result<DynamicImage, OcrError> {
    let (width, height) = image.dimensions();

    let scale_x = if width > max_width {
        max_width as f32 / width as f32
    } else {
        1.0
    };
    let scale_y = if height > max_height {
        max_height as f32 / height as f32
    } else {
        1.0
    };

    // Smaller factor keeps both dimensions in bounds
    let scale = scale_x.min(scale_y);

    if scale >= 1.0 {
        return Ok(image.clone());
    }

    let new_width = (width as f32 * scale) as u32;
    let new_height = (height as f32 * scale) as u32;

    tracing::debug!(
        "Resized image from {}x{} to {}x{}",
        width,
        height,
        new_width,
        new_height
    );

    Ok(image.resize_exact(new_width, new_height, FilterType::Lanczos3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_resize_never_upscales() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(100, 80));
        let result = apply(&img, 2000, 3000).unwrap();
        assert_eq!(result.width(), 100);
        assert_eq!(result.height(), 80);
    }

    #[test]
    fn test_resize_limits_large_image() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(4000, 3000));
        let result = apply(&img, 2000, 3000).unwrap();
        assert!(result.width() <= 2000);
        assert!(result.height() <= 3000);
    }

    #[test]
    fn test_resize_preserves_aspect_ratio() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(4000, 2000));
        let result = apply(&img, 2000, 3000).unwrap();
        // Scale factor 0.5 applies to both dimensions
        assert_eq!(result.width(), 2000);
        assert_eq!(result.height(), 1000);
    }

    #[test]
    fn test_resize_uses_smaller_scale_factor() {
        // Height is the binding constraint here
        let img = DynamicImage::ImageLuma8(GrayImage::new(2100, 6000));
        let result = apply(&img, 2000, 3000).unwrap();
        assert_eq!(result.height(), 3000);
        assert!(result.width() <= 2000);
    }
}
