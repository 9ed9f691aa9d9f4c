use crate::error::OcrError;
use image::DynamicImage;
use std::time::Instant;

use super::steps;

/// Maximum dimensions for the handwriting profile
const HANDWRITING_MAX: (u32, u32) = (2000, 3000);
/// Maximum dimensions for the printed-text profile
const PRINTED_MAX: (u32, u32) = (3000, 4000);

/// Preprocessing profile selected per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Aggressive cleanup tuned for handwritten answers (~200-400ms)
    /// Steps: resize, grayscale, bilateral denoise, CLAHE, adaptive
    /// threshold, stroke closing, speck removal, edge refinement
    #[default]
    Handwriting,
    /// Faster pipeline for printed question sheets (~50-150ms)
    /// Steps: resize, grayscale, median denoise, CLAHE, Otsu threshold
    PrintedText,
}

impl Profile {
    /// Parse from query parameter string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "handwriting" => Some(Self::Handwriting),
            "printed" | "printed_text" => Some(Self::PrintedText),
            _ => None,
        }
    }

    /// Map the request-level handwriting-enhancement flag to a profile
    pub fn from_handwriting_flag(enhance_handwriting: bool) -> Self {
        if enhance_handwriting {
            Self::Handwriting
        } else {
            Self::PrintedText
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handwriting => "handwriting",
            Self::PrintedText => "printed_text",
        }
    }
}

/// Result of normalization, including any degradation notes
#[derive(Debug)]
pub struct NormalizeOutcome {
    /// Normalized bitmap, binary after thresholding
    pub image: DynamicImage,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// One entry per skipped step; empty when the full pipeline ran
    pub warnings: Vec<String>,
}

/// Preprocessing pipeline for one profile.
///
/// Normalization never fails: a step that errors is skipped with a warning
/// and the best bitmap produced so far flows on, with the decoded input as
/// the floor. Recognition always receives something usable.
pub struct Pipeline {
    profile: Profile,
}

impl Pipeline {
    pub fn new(profile: Profile) -> Self {
        Self { profile }
    }

    /// Normalize a decoded image according to the configured profile
    pub fn normalize(&self, image: DynamicImage) -> NormalizeOutcome {
        let start = Instant::now();
        let mut warnings = Vec::new();

        let img = match self.profile {
            Profile::Handwriting => self.normalize_handwriting(image, &mut warnings),
            Profile::PrintedText => self.normalize_printed(image, &mut warnings),
        };

        NormalizeOutcome {
            image: img,
            total_time_ms: start.elapsed().as_millis() as u64,
            warnings,
        }
    }

    fn normalize_handwriting(
        &self,
        image: DynamicImage,
        warnings: &mut Vec<String>,
    ) -> DynamicImage {
        let (max_w, max_h) = HANDWRITING_MAX;
        let mut img = image;
        img = run_step("resize", img, warnings, |i| {
            steps::resize::apply(i, max_w, max_h)
        });
        img = run_step("grayscale", img, warnings, steps::grayscale::apply);
        img = run_step("denoise", img, warnings, steps::denoise::bilateral);
        img = run_step("contrast", img, warnings, |i| steps::contrast::clahe(i, 3.0));
        img = run_step("threshold", img, warnings, steps::threshold::adaptive);
        img = run_step("close", img, warnings, steps::morphology::close_strokes);
        img = run_step("despeckle", img, warnings, steps::morphology::remove_specks);
        img = run_step("refine", img, warnings, steps::morphology::refine_edges);
        img
    }

    fn normalize_printed(&self, image: DynamicImage, warnings: &mut Vec<String>) -> DynamicImage {
        let (max_w, max_h) = PRINTED_MAX;
        let mut img = image;
        img = run_step("resize", img, warnings, |i| {
            steps::resize::apply(i, max_w, max_h)
        });
        img = run_step("grayscale", img, warnings, steps::grayscale::apply);
        img = run_step("denoise", img, warnings, steps::denoise::median);
        img = run_step("contrast", img, warnings, |i| steps::contrast::clahe(i, 2.0));
        img = run_step("threshold", img, warnings, steps::threshold::otsu);
        img
    }
}

fn run_step<F>(
    name: &str,
    img: DynamicImage,
    warnings: &mut Vec<String>,
    step_fn: F,
) -> DynamicImage
where
    F: FnOnce(&DynamicImage) -> Result<DynamicImage, OcrError>,
{
    match step_fn(&img) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!("Preprocessing step '{}' skipped: {}", name, e);
            warnings.push(format!("preprocessing step '{}' skipped: {}", name, e));
            img
        }
    }
}
