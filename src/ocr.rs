//! Recognition orchestration and result fusion
//!
//! Runs every available engine over the normalized bitmap, sequentially and
//! in priority order, then merges the surviving observations into a single
//! answer for the scoring service.

use crate::engine::Observation;
use crate::engines::EngineRegistry;
use crate::error::OcrError;
use crate::preprocessing::Profile;
use image::DynamicImage;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;

/// Word-set Jaccard similarity above which two readings corroborate each
/// other and are merged rather than one being discarded
const CORROBORATION_THRESHOLD: f32 = 0.7;

/// Provider marker for a merged reading
const COMBINED_PROVIDER: &str = "combined";

/// Fused recognition result handed to the scoring service
#[derive(Debug, Clone, Serialize)]
pub struct FusedResult {
    pub text: String,
    pub confidence: f32,
    /// A single engine name, or "combined" when readings were merged
    pub provider: String,
    /// Wall-clock seconds from the first engine invocation to the end of
    /// fusion
    pub processing_time: f64,
}

/// Orchestrates the recognition engines for one process lifetime
pub struct OcrProcessor {
    registry: EngineRegistry,
}

impl OcrProcessor {
    pub fn new(registry: EngineRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Extract text from a normalized bitmap.
    ///
    /// Engines run one after another; a failing engine is logged and
    /// excluded, never fatal to the request. When no engine produces text
    /// the request fails with `AllEnginesEmpty` so callers can tell the
    /// difference from a legitimately blank page transcription.
    pub fn extract(
        &self,
        bitmap: &DynamicImage,
        profile: Profile,
        language: Option<&str>,
    ) -> Result<FusedResult, OcrError> {
        let start = Instant::now();
        let mut observations = Vec::new();
        let mut attempted = 0usize;

        for engine in self.registry.available() {
            if !engine.accepts(profile) {
                continue;
            }
            attempted += 1;

            match engine.detect(bitmap, language) {
                Ok(observation) => {
                    if observation.text.trim().is_empty() {
                        tracing::debug!("Engine {} returned no text", engine.name());
                        continue;
                    }
                    tracing::info!(
                        "Engine {} extracted {} characters (confidence {:.2})",
                        engine.name(),
                        observation.text.len(),
                        observation.confidence
                    );
                    observations.push(observation);
                }
                Err(e) => {
                    tracing::warn!("Engine {} failed: {}", engine.name(), e);
                }
            }
        }

        if observations.is_empty() {
            let diagnostic = if attempted == 0 {
                "no recognition engine is available for this profile".to_string()
            } else {
                format!("all {} attempted engines yielded no text", attempted)
            };
            return Err(OcrError::AllEnginesEmpty(diagnostic));
        }

        let mut fused = fuse(observations);
        fused.processing_time = start.elapsed().as_secs_f64();
        Ok(fused)
    }
}

/// Merge per-engine observations into one result. Requires at least one
/// observation.
///
/// The highest-confidence reading is the base. Every other reading either
/// corroborates the working text (Jaccard >= 0.7) and is merged into it, or
/// is discarded; concatenating two unrelated transcriptions would fabricate
/// a hybrid no engine actually saw.
pub fn fuse(mut observations: Vec<Observation>) -> FusedResult {
    observations.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let base = &observations[0];
    let confidence = base.confidence;

    if observations.len() == 1 {
        return FusedResult {
            text: base.text.clone(),
            confidence,
            provider: base.engine.to_string(),
            processing_time: 0.0,
        };
    }

    let mut working_text = base.text.clone();
    let mut provider = base.engine.to_string();

    for other in &observations[1..] {
        let similarity = jaccard_similarity(&working_text, &other.text);
        if similarity >= CORROBORATION_THRESHOLD {
            working_text = merge_corroborating(&working_text, &other.text);
            provider = COMBINED_PROVIDER.to_string();
        } else {
            tracing::debug!(
                "Discarding {} reading (similarity {:.2} below threshold)",
                other.engine,
                similarity
            );
        }
    }

    FusedResult {
        text: working_text,
        confidence,
        provider,
        processing_time: 0.0,
    }
}

/// Word-set Jaccard similarity over lowercased whitespace tokens.
/// 1.0 when both token sets are empty, 0.0 when exactly one is.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let set_a: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let set_b: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f32 / union as f32
}

/// Merge two corroborating readings: keep the longer text, then append the
/// other reading's tokens that are missing from it, in their original order.
fn merge_corroborating(a: &str, b: &str) -> String {
    let (longer, other) = if b.len() > a.len() { (b, a) } else { (a, b) };

    let mut seen: HashSet<String> = longer
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let mut merged = longer.to_string();
    for token in other.split_whitespace() {
        let key = token.to_lowercase();
        if !seen.contains(&key) {
            merged.push(' ');
            merged.push_str(token);
            seen.insert(key);
        }
    }

    merged
}
