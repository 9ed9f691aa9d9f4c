use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::median_filter;

/// Bilateral filter window radius (9x9 window)
const BILATERAL_RADIUS: i32 = 4;
/// Intensity-domain sigma
const SIGMA_COLOR: f32 = 75.0;
/// Spatial-domain sigma
const SIGMA_SPACE: f32 = 75.0;

/// Apply a 3x3 median filter to reduce noise
/// Effective for salt-and-pepper noise in printed-text scans
pub fn median(image: &DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();
    let denoised = median_filter(&gray, 1, 1);
    Ok(DynamicImage::ImageLuma8(denoised))
}

/// Edge-preserving bilateral filter for handwriting photos.
///
/// Weights each neighbour by spatial distance and intensity difference, so
/// smooth paper regions are averaged while pen strokes keep their edges.
pub fn bilateral(image: &DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();

    // Precompute the spatial kernel and the intensity-difference weights
    let window = (2 * BILATERAL_RADIUS + 1) as usize;
    let mut spatial = vec![0.0f32; window * window];
    for dy in -BILATERAL_RADIUS..=BILATERAL_RADIUS {
        for dx in -BILATERAL_RADIUS..=BILATERAL_RADIUS {
            let d2 = (dx * dx + dy * dy) as f32;
            let idx = (dy + BILATERAL_RADIUS) as usize * window + (dx + BILATERAL_RADIUS) as usize;
            spatial[idx] = (-d2 / (2.0 * SIGMA_SPACE * SIGMA_SPACE)).exp();
        }
    }
    let mut range = [0.0f32; 256];
    for (d, w) in range.iter_mut().enumerate() {
        let d2 = (d * d) as f32;
        *w = (-d2 / (2.0 * SIGMA_COLOR * SIGMA_COLOR)).exp();
    }

    let filtered = GrayImage::from_fn(width, height, |x, y| {
        let center = gray.get_pixel(x, y).0[0];
        let mut acc = 0.0f32;
        let mut norm = 0.0f32;

        for dy in -BILATERAL_RADIUS..=BILATERAL_RADIUS {
            let ny = y as i32 + dy;
            if ny < 0 || ny >= height as i32 {
                continue;
            }
            for dx in -BILATERAL_RADIUS..=BILATERAL_RADIUS {
                let nx = x as i32 + dx;
                if nx < 0 || nx >= width as i32 {
                    continue;
                }
                let neighbour = gray.get_pixel(nx as u32, ny as u32).0[0];
                let diff = (neighbour as i32 - center as i32).unsigned_abs() as usize;
                let idx = (dy + BILATERAL_RADIUS) as usize * window
                    + (dx + BILATERAL_RADIUS) as usize;
                let weight = spatial[idx] * range[diff];
                acc += weight * neighbour as f32;
                norm += weight;
            }
        }

        Luma([(acc / norm).round().clamp(0.0, 255.0) as u8])
    });

    Ok(DynamicImage::ImageLuma8(filtered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn variance(img: &GrayImage) -> f64 {
        let pixels: Vec<f64> = img.pixels().map(|p| p.0[0] as f64).collect();
        let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;
        pixels.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / pixels.len() as f64
    }

    #[test]
    fn test_median_reduces_salt_pepper_noise() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([128]));
        img.put_pixel(5, 5, Luma([0])); // "pepper" noise
        img.put_pixel(6, 5, Luma([255])); // "salt" noise

        let result = median(&DynamicImage::ImageLuma8(img.clone())).unwrap();
        let result_gray = result.to_luma8();

        assert!(variance(&result_gray) <= variance(&img));
    }

    #[test]
    fn test_bilateral_smooths_flat_noise() {
        // Mild noise on a flat background should be averaged away
        let mut img = GrayImage::from_pixel(20, 20, Luma([200]));
        img.put_pixel(10, 10, Luma([190]));
        img.put_pixel(11, 10, Luma([210]));

        let result = bilateral(&DynamicImage::ImageLuma8(img.clone())).unwrap();
        let result_gray = result.to_luma8();

        assert!(variance(&result_gray) < variance(&img));
    }

    #[test]
    fn test_bilateral_preserves_strong_edge() {
        // Hard black/white edge should survive where a box blur would not
        let img = GrayImage::from_fn(20, 20, |x, _| if x < 10 { Luma([10]) } else { Luma([245]) });

        let result = bilateral(&DynamicImage::ImageLuma8(img)).unwrap();
        let result_gray = result.to_luma8();

        let left = result_gray.get_pixel(8, 10).0[0];
        let right = result_gray.get_pixel(11, 10).0[0];
        assert!(
            right as i32 - left as i32 > 180,
            "edge collapsed: {} vs {}",
            left,
            right
        );
    }

    #[test]
    fn test_bilateral_preserves_dimensions() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(30, 15));
        let result = bilateral(&img).unwrap();
        assert_eq!(result.width(), 30);
        assert_eq!(result.height(), 15);
    }
}
