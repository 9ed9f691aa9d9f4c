use crate::error::OcrError;
use crate::preprocessing::Profile;
use image::DynamicImage;

/// One engine's reading of a single image.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub text: String,
    /// Confidence in [0, 1], derived per engine from its native scores.
    pub confidence: f32,
    pub engine: &'static str,
}

/// Outcome of the one-time initialization attempt for an engine.
///
/// Fixed for the lifetime of the process: a failed initialization is never
/// retried, a restart is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Available,
    NotInstalled,
    Error(String),
}

impl EngineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::NotInstalled => "not_installed",
            Self::Error(_) => "error",
        }
    }
}

/// Trait that all recognition backends implement.
pub trait TextEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "paddle", "ocrs", "tesseract")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Whether GPU acceleration was configured at startup
    fn gpu_enabled(&self) -> bool {
        false
    }

    /// Whether this engine should be invoked for the given profile
    fn accepts(&self, profile: Profile) -> bool {
        let _ = profile;
        true
    }

    /// Recognize text in a normalized bitmap. The language hint is advisory;
    /// engines may ignore it.
    fn detect(
        &self,
        image: &DynamicImage,
        language: Option<&str>,
    ) -> Result<Observation, OcrError>;
}
