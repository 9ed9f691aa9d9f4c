use image::{DynamicImage, GrayImage};
use serde::Serialize;

/// Overall quality band derived from the additive score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityLevel {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityLevel {
    fn from_score(score: u32) -> Self {
        match score {
            s if s >= 80 => Self::Excellent,
            s if s >= 60 => Self::Good,
            s if s >= 40 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

/// Whether the image can go straight to recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    NeedsPreprocessing,
}

/// Quality metrics and capture recommendations for an uploaded photo.
/// Pure function of the image; independent of the recognition path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub width: u32,
    pub height: u32,
    pub mean_brightness: f64,
    pub brightness_std: f64,
    pub contrast: f64,
    /// Variance of the Laplacian response; low values indicate blur
    pub sharpness: f64,
    pub score: u32,
    pub level: QualityLevel,
    pub recommendations: Vec<String>,
    pub readiness: Readiness,
}

/// Analyze an uploaded photo and score how well it will OCR.
///
/// Score is additive over four bands (resolution, brightness, contrast,
/// sharpness); each failing band contributes a capture recommendation.
pub fn analyze(image: &DynamicImage) -> QualityReport {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();

    let (mean_brightness, brightness_std) = brightness_stats(&gray);
    // Contrast is the spread of the grayscale distribution
    let contrast = brightness_std;
    let sharpness = laplacian_variance(&gray);

    let mut score = 0u32;
    let mut recommendations = Vec::new();

    if width < 800 || height < 600 {
        score += 20;
        recommendations
            .push("Image resolution is low. Consider using higher resolution images.".to_string());
    } else if width >= 2000 || height >= 1500 {
        score += 30;
    } else {
        score += 25;
    }

    if mean_brightness < 50.0 {
        score += 15;
        recommendations.push("Image is too dark. Consider improving lighting.".to_string());
    } else if mean_brightness > 200.0 {
        score += 15;
        recommendations.push("Image is too bright. Consider reducing exposure.".to_string());
    } else {
        score += 20;
    }

    if contrast < 30.0 {
        score += 10;
        recommendations.push("Image has low contrast. Consider enhancing contrast.".to_string());
    } else {
        score += 20;
    }

    if sharpness < 100.0 {
        score += 10;
        recommendations
            .push("Image is blurry. Consider using a tripod or improving focus.".to_string());
    } else {
        score += 20;
    }

    let level = QualityLevel::from_score(score);
    let readiness = if score >= 60 {
        Readiness::Ready
    } else {
        Readiness::NeedsPreprocessing
    };

    QualityReport {
        width,
        height,
        mean_brightness,
        brightness_std,
        contrast,
        sharpness,
        score,
        level,
        recommendations,
        readiness,
    }
}

fn brightness_stats(gray: &GrayImage) -> (f64, f64) {
    let count = (gray.width() * gray.height()) as f64;
    if count == 0.0 {
        return (0.0, 0.0);
    }

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for pixel in gray.pixels() {
        let v = pixel.0[0] as f64;
        sum += v;
        sum_sq += v * v;
    }

    let mean = sum / count;
    let variance = (sum_sq / count - mean * mean).max(0.0);
    (mean, variance.sqrt())
}

/// Variance of the 4-neighbour Laplacian over interior pixels
fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut responses = Vec::with_capacity(((width - 2) * (height - 2)) as usize);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = gray.get_pixel(x, y).0[0] as f64;
            let lap = gray.get_pixel(x - 1, y).0[0] as f64
                + gray.get_pixel(x + 1, y).0[0] as f64
                + gray.get_pixel(x, y - 1).0[0] as f64
                + gray.get_pixel(x, y + 1).0[0] as f64
                - 4.0 * center;
            responses.push(lap);
        }
    }

    let count = responses.len() as f64;
    let mean = responses.iter().sum::<f64>() / count;
    responses.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / count
}
