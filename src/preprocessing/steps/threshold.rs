use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};

/// Local window for adaptive thresholding (11x11)
const ADAPTIVE_WINDOW: u32 = 11;
/// Offset subtracted from the local mean
const ADAPTIVE_OFFSET: f32 = 2.0;

/// Adaptive local thresholding for handwriting.
///
/// Each pixel is compared against the mean of its 11x11 neighbourhood minus
/// a small offset, so uneven lighting across a photographed page does not
/// swallow whole regions the way a single global threshold would. Text ends
/// up black (0) on a white (255) background.
pub fn adaptive(image: &DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();
    let binarized = adaptive_mean_threshold(&gray, ADAPTIVE_WINDOW, ADAPTIVE_OFFSET);
    Ok(DynamicImage::ImageLuma8(binarized))
}

/// Global binarization via Otsu's variance-maximizing threshold.
/// Sufficient for printed text with even lighting, and much cheaper.
pub fn otsu(image: &DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();
    let level = otsu_level(&gray);
    let binarized = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] > level {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    Ok(DynamicImage::ImageLuma8(binarized))
}

/// Mean-based adaptive thresholding using an integral image for O(1)
/// window sums
fn adaptive_mean_threshold(img: &GrayImage, window_size: u32, offset: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let half_window = window_size as i32 / 2;

    let integral = compute_integral_image(img);

    GrayImage::from_fn(width, height, |x, y| {
        let x1 = (x as i32 - half_window).max(0) as usize;
        let y1 = (y as i32 - half_window).max(0) as usize;
        let x2 = (x as i32 + half_window + 1).min(width as i32) as usize;
        let y2 = (y as i32 + half_window + 1).min(height as i32) as usize;

        let area = ((x2 - x1) * (y2 - y1)) as f32;
        let sum =
            integral[y2][x2] + integral[y1][x1] - integral[y1][x2] - integral[y2][x1];
        let mean = sum as f32 / area;

        let pixel = img.get_pixel(x, y).0[0] as f32;
        if pixel > mean - offset {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Compute integral image for fast rectangle sum queries
fn compute_integral_image(img: &GrayImage) -> Vec<Vec<u64>> {
    let (width, height) = img.dimensions();
    let mut integral = vec![vec![0u64; width as usize + 1]; height as usize + 1];

    for y in 0..height as usize {
        for x in 0..width as usize {
            let val = img.get_pixel(x as u32, y as u32).0[0] as u64;
            integral[y + 1][x + 1] =
                val + integral[y][x + 1] + integral[y + 1][x] - integral[y][x];
        }
    }

    integral
}

/// Find the threshold that maximizes inter-class variance between the
/// foreground and background intensity populations
fn otsu_level(img: &GrayImage) -> u8 {
    let mut histogram = [0u32; 256];
    for pixel in img.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total_pixels = (img.width() * img.height()) as f64;
    let mut sum_total = 0.0;
    for (value, &count) in histogram.iter().enumerate() {
        sum_total += value as f64 * count as f64;
    }

    let mut sum_background = 0.0;
    let mut weight_background = 0.0;
    let mut max_variance = 0.0;
    let mut level = 0u8;

    for (value, &count) in histogram.iter().enumerate() {
        weight_background += count as f64;
        if weight_background == 0.0 {
            continue;
        }

        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0.0 {
            break;
        }

        sum_background += value as f64 * count as f64;

        let mean_background = sum_background / weight_background;
        let mean_foreground = (sum_total - sum_background) / weight_foreground;

        let variance =
            weight_background * weight_foreground * (mean_background - mean_foreground).powi(2);

        if variance > max_variance {
            max_variance = variance;
            level = value as u8;
        }
    }

    level
}
