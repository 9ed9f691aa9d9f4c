//! ocrs engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies
//! required; neural network models are downloaded on first use. The backend
//! reports no native scores, so each detected line is rated with a text
//! quality heuristic and the observation confidence is the mean over lines.

use crate::config::Config;
use crate::engine::{Observation, TextEngine};
use crate::error::OcrError;
use image::DynamicImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsBackend, OcrEngineParams};
use rten::Model;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const DESCRIPTION: &str = "Pure Rust OCR engine - fast, no system dependencies required";

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

/// General-purpose engine wrapping the ocrs library
pub struct OcrsEngine {
    engine: OcrsBackend,
}

impl OcrsEngine {
    /// Create the engine, downloading models if they are not cached yet
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let detection_model_path =
            ensure_model_downloaded(config, DETECTION_MODEL_URL, "text-detection.rten")?;
        let recognition_model_path =
            ensure_model_downloaded(config, RECOGNITION_MODEL_URL, "text-recognition.rten")?;

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsBackend::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            OcrError::InitializationError(format!("Failed to create ocrs engine: {}", e))
        })?;

        tracing::info!("ocrs engine initialized successfully");

        Ok(Self { engine })
    }
}

impl TextEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn detect(
        &self,
        image: &DynamicImage,
        _language: Option<&str>,
    ) -> Result<Observation, OcrError> {
        let call_failed = |message: String| OcrError::EngineCallFailed {
            engine: "ocrs",
            message,
        };

        let rgb_img = image.to_rgb8();
        let dimensions = rgb_img.dimensions();

        // HWC byte layout, which is what ImageSource::from_bytes expects
        let img_source = ImageSource::from_bytes(rgb_img.as_raw(), dimensions)
            .map_err(|e| call_failed(format!("Failed to create image source: {}", e)))?;

        let ocr_input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| call_failed(format!("Failed to prepare input: {}", e)))?;

        let word_rects = self
            .engine
            .detect_words(&ocr_input)
            .map_err(|e| call_failed(format!("Failed to detect words: {}", e)))?;

        let line_rects = self.engine.find_text_lines(&ocr_input, &word_rects);

        let line_texts = self
            .engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| call_failed(format!("Failed to recognize text: {}", e)))?;

        let lines: Vec<String> = line_texts
            .iter()
            .filter_map(|line| line.as_ref())
            .map(|line| {
                line.words()
                    .map(|word| word.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|line| !line.trim().is_empty())
            .collect();

        // Mean of per-detection scores; the backend exposes none of its
        // own, so each line is rated by a text quality heuristic
        let confidence = if lines.is_empty() {
            0.0
        } else {
            lines.iter().map(|l| line_quality_score(l)).sum::<f32>() / lines.len() as f32
        };

        Ok(Observation {
            text: lines.join("\n"),
            confidence,
            engine: "ocrs",
        })
    }
}

// ============================================================================
// Per-line quality heuristic
// ============================================================================

/// Rate one recognized line in [0, 1] from textual plausibility.
///
/// Garbled OCR output shows up as unusual character mixes, degenerate word
/// shapes, and long repeated runs; clean transcriptions score near 1.0.
fn line_quality_score(line: &str) -> f32 {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if trimmed.chars().count() < 4 {
        // Too short to judge
        return 0.5;
    }

    let score = 0.5 * character_mix_score(trimmed)
        + 0.3 * word_shape_score(trimmed)
        + 0.2 * repetition_score(trimmed);
    score.clamp(0.0, 1.0)
}

/// Ratio-based check of the character classes present in the line.
/// Heavy non-alphanumeric content outside common punctuation reads as noise.
fn character_mix_score(line: &str) -> f32 {
    let total = line.chars().count() as f32;
    let mut letters = 0usize;
    let mut exotic = 0usize;

    for c in line.chars() {
        if c.is_alphanumeric() {
            letters += 1;
        } else if !c.is_whitespace() && !c.is_ascii_punctuation() {
            exotic += 1;
        }
    }

    let exotic_penalty = 1.0 - (exotic as f32 / total * 8.0).min(1.0);
    let letter_ratio = (letters as f32 / total * 1.4).min(1.0);
    exotic_penalty * 0.6 + letter_ratio * 0.4
}

/// Check word lengths against what natural writing looks like.
/// A line of one-character fragments is usually a mis-segmented stroke.
fn word_shape_score(line: &str) -> f32 {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }

    let avg_len =
        words.iter().map(|w| w.chars().count()).sum::<usize>() as f32 / words.len() as f32;
    let avg_score = if (2.0..=10.0).contains(&avg_len) {
        1.0
    } else if avg_len < 2.0 {
        0.4
    } else {
        0.6
    };

    let fragments = words.iter().filter(|w| w.chars().count() == 1).count();
    let fragment_ratio = fragments as f32 / words.len() as f32;

    avg_score * (1.0 - (fragment_ratio * 1.2).min(0.6))
}

/// Long runs of one repeated character indicate decoder confusion
fn repetition_score(line: &str) -> f32 {
    let mut max_run = 1u32;
    let mut run = 1u32;
    let mut prev: Option<char> = None;

    for c in line.chars() {
        if Some(c) == prev && !c.is_whitespace() {
            run += 1;
            max_run = max_run.max(run);
        } else {
            run = 1;
        }
        prev = Some(c);
    }

    match max_run {
        1..=3 => 1.0,
        4..=6 => 0.7,
        7..=10 => 0.4,
        _ => 0.2,
    }
}

// ============================================================================
// Model download helpers
// ============================================================================

/// Resolve a model file, preferring the configured model directory and
/// falling back to a cache-directory download
fn ensure_model_downloaded(
    config: &Config,
    url: &str,
    filename: &str,
) -> Result<std::path::PathBuf, OcrError> {
    if let Some(dir) = &config.model_dir {
        let local = Path::new(dir).join(filename);
        if local.exists() {
            tracing::info!("Using model from {:?}", local);
            return Ok(local);
        }
    }

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("scriptscan-ocr");

    std::fs::create_dir_all(&cache_dir).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create cache directory: {}", e))
    })?;

    let model_path = cache_dir.join(filename);

    if !model_path.exists() {
        tracing::info!("Downloading {} (this may take a moment)...", filename);
        download_file(url, &model_path)?;
        tracing::info!("Downloaded {} to {:?}", filename, model_path);
    } else {
        tracing::info!("Using cached model from {:?}", model_path);
    }

    Ok(model_path)
}

/// Download a file from URL to path using ureq
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| OcrError::InitializationError(format!("Failed to download model: {}", e)))?;

    let mut file = File::create(path).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create model file: {}", e))
    })?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        OcrError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    file.write_all(&buffer)
        .map_err(|e| OcrError::InitializationError(format!("Failed to write model file: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_line_scores_zero() {
        assert_eq!(line_quality_score(""), 0.0);
        assert_eq!(line_quality_score("   "), 0.0);
    }

    #[test]
    fn test_short_line_scores_half() {
        assert_eq!(line_quality_score("Hi"), 0.5);
    }

    #[test]
    fn test_clean_line_scores_high() {
        let score = line_quality_score("The mitochondria is the powerhouse of the cell");
        assert!(score > 0.8, "Expected > 0.8, got {}", score);
    }

    #[test]
    fn test_exotic_characters_score_low() {
        let score = line_quality_score("§±®©¥€£¢¤ƒ∂∆");
        assert!(score < 0.5, "Expected < 0.5, got {}", score);
    }

    #[test]
    fn test_fragmented_line_scores_lower_than_clean() {
        let clean = line_quality_score("photosynthesis requires light energy");
        let fragmented = line_quality_score("p h o t o s y n t h e s i s");
        assert!(fragmented < clean);
    }

    #[test]
    fn test_repeated_runs_lower_score() {
        let clean = line_quality_score("boundary conditions apply");
        let garbled = line_quality_score("boundaryyyyyyyyyy conditions apply");
        assert!(garbled < clean);
    }
}
