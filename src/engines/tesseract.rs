//! Tesseract engine implementation
//!
//! Baseline fallback backend, attempted last regardless of profile so every
//! deployment has some coverage even without the neural engines. Uses the
//! tesseract-static crate for static linking (no system dependencies) and
//! downloads tessdata (training data) automatically on first use.

use crate::config::Config;
use crate::engine::{Observation, TextEngine};
use crate::error::OcrError;
use image::DynamicImage;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tesseract_static::tesseract::Tesseract;

pub const DESCRIPTION: &str =
    "Tesseract OCR engine - baseline fallback, broad language coverage";

/// Tesseract-backed recognition engine
pub struct TesseractEngine {
    /// Path to tessdata directory
    tessdata_path: String,
    /// Language used when a request carries no hint
    default_language: String,
}

impl TesseractEngine {
    /// Create the engine, downloading tessdata for the default language if
    /// needed, and validate it with a throwaway initialization
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let default_language = config.default_language.clone();

        let tessdata_path = match &config.tessdata_path {
            Some(path) => path.clone(),
            None => ensure_tessdata_available(&default_language)?,
        };

        let test_tess =
            Tesseract::new(Some(&tessdata_path), Some(&default_language)).map_err(|e| {
                OcrError::InitializationError(format!("Failed to initialize Tesseract: {}", e))
            })?;
        drop(test_tess);

        tracing::info!(
            "tesseract engine initialized (tessdata: {}, language: {})",
            tessdata_path,
            default_language
        );

        Ok(Self {
            tessdata_path,
            default_language,
        })
    }
}

impl TextEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn detect(
        &self,
        image: &DynamicImage,
        language: Option<&str>,
    ) -> Result<Observation, OcrError> {
        let call_failed = |message: String| OcrError::EngineCallFailed {
            engine: "tesseract",
            message,
        };

        let language = language.unwrap_or(&self.default_language);

        // Convert to BMP in memory (BMP is always supported by leptonica)
        let rgb_img = image.to_rgb8();
        let mut bmp_data = Vec::new();
        {
            let mut cursor = std::io::Cursor::new(&mut bmp_data);
            rgb_img
                .write_to(&mut cursor, image::ImageFormat::Bmp)
                .map_err(|e| call_failed(format!("Failed to convert to BMP: {}", e)))?;
        }

        // Tesseract instances are cheap once tessdata is on disk; a fresh
        // one per call also sidesteps any shared-state concerns under
        // concurrent requests
        let mut tess = Tesseract::new(Some(&self.tessdata_path), Some(language))
            .map_err(|e| call_failed(format!("Failed to create Tesseract: {}", e)))?;

        tess = tess
            .set_image_from_mem(&bmp_data)
            .map_err(|e| call_failed(format!("Failed to set image: {}", e)))?;

        tess = tess
            .recognize()
            .map_err(|e| call_failed(format!("Failed to recognize text: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| call_failed(format!("Failed to get text: {}", e)))?;

        // Mean word-level confidence on a 0-100 scale; negative means no
        // word had positive confidence
        let confidence = (tess.mean_text_conf() as f32 / 100.0).clamp(0.0, 1.0);

        Ok(Observation {
            text: text.trim().to_string(),
            confidence,
            engine: "tesseract",
        })
    }
}

// ============================================================================
// Tessdata download helpers
// ============================================================================

/// Ensure tessdata is available, downloading if needed
fn ensure_tessdata_available(language: &str) -> Result<String, OcrError> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("scriptscan-ocr")
        .join("tessdata");

    std::fs::create_dir_all(&cache_dir).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create tessdata directory: {}", e))
    })?;

    let traineddata_file = format!("{}.traineddata", language);
    let traineddata_path = cache_dir.join(&traineddata_file);

    if !traineddata_path.exists() {
        let url = tessdata_url(language);
        tracing::info!(
            "Downloading tessdata for '{}' (this may take a moment)...",
            language
        );
        download_file(&url, &traineddata_path)?;
        tracing::info!("Downloaded tessdata to {:?}", traineddata_path);
    } else {
        tracing::info!("Using cached tessdata from {:?}", cache_dir);
    }

    // Tesseract expects the directory, not the file
    cache_dir
        .to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| OcrError::InitializationError("Invalid tessdata path".to_string()))
}

/// Get tessdata download URL for a language
fn tessdata_url(language: &str) -> String {
    // tessdata_fast for smaller, faster downloads
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    )
}

/// Download a file from URL to path using ureq
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url).call().map_err(|e| {
        OcrError::InitializationError(format!("Failed to download tessdata: {}", e))
    })?;

    let mut file = File::create(path).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create tessdata file: {}", e))
    })?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        OcrError::InitializationError(format!("Failed to read tessdata response: {}", e))
    })?;

    file.write_all(&buffer).map_err(|e| {
        OcrError::InitializationError(format!("Failed to write tessdata file: {}", e))
    })?;

    Ok(())
}
