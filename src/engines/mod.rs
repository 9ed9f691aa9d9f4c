//! Recognition engine implementations
//!
//! This module contains implementations of the TextEngine trait for the
//! supported backends. Engines are conditionally compiled based on feature
//! flags and probed exactly once at startup; a backend whose initialization
//! fails stays out of the invocation set until the process is restarted.

#[cfg(feature = "engine-paddle")]
pub mod paddle;

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

#[cfg(feature = "engine-tesseract")]
pub mod tesseract;

use crate::config::Config;
use crate::engine::{EngineStatus, TextEngine};
use std::sync::Arc;

/// Boot-time record for one engine, served by the capability endpoint
#[derive(Debug, Clone)]
pub struct EngineEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub status: EngineStatus,
    pub gpu_enabled: bool,
}

/// Immutable registry of recognition engines, built once at startup.
///
/// `available()` yields engines in invocation priority order: paddle
/// (handwriting-tuned), then ocrs (general purpose), then tesseract (the
/// baseline fallback).
pub struct EngineRegistry {
    engines: Vec<Arc<dyn TextEngine>>,
    entries: Vec<EngineEntry>,
}

impl EngineRegistry {
    /// Probe and initialize every compiled-in engine.
    ///
    /// Initialization failures are recorded, not propagated: the process
    /// serves capability queries either way, and requests fail per-call
    /// with AllEnginesEmpty if nothing came up.
    pub fn new(config: &Config) -> Self {
        let mut engines: Vec<Arc<dyn TextEngine>> = Vec::new();
        let mut entries = Vec::new();

        #[cfg(feature = "engine-paddle")]
        {
            tracing::info!("Initializing paddle engine...");
            match paddle::PaddleEngine::new(config) {
                Ok(engine) => {
                    let engine = Arc::new(engine);
                    entries.push(EngineEntry {
                        name: engine.name(),
                        description: engine.description(),
                        status: EngineStatus::Available,
                        gpu_enabled: engine.gpu_enabled(),
                    });
                    engines.push(engine);
                }
                Err(e) => {
                    tracing::error!("paddle engine initialization failed: {}", e);
                    entries.push(EngineEntry {
                        name: "paddle",
                        description: paddle::DESCRIPTION,
                        status: EngineStatus::Error(e.to_string()),
                        gpu_enabled: config.use_gpu,
                    });
                }
            }
        }
        #[cfg(not(feature = "engine-paddle"))]
        entries.push(EngineEntry {
            name: "paddle",
            description: "PaddleOCR recognition model via ONNX Runtime",
            status: EngineStatus::NotInstalled,
            gpu_enabled: false,
        });

        #[cfg(feature = "engine-ocrs")]
        {
            tracing::info!("Initializing ocrs engine...");
            match ocrs::OcrsEngine::new(config) {
                Ok(engine) => {
                    let engine = Arc::new(engine);
                    entries.push(EngineEntry {
                        name: engine.name(),
                        description: engine.description(),
                        status: EngineStatus::Available,
                        gpu_enabled: engine.gpu_enabled(),
                    });
                    engines.push(engine);
                }
                Err(e) => {
                    tracing::error!("ocrs engine initialization failed: {}", e);
                    entries.push(EngineEntry {
                        name: "ocrs",
                        description: ocrs::DESCRIPTION,
                        status: EngineStatus::Error(e.to_string()),
                        gpu_enabled: false,
                    });
                }
            }
        }
        #[cfg(not(feature = "engine-ocrs"))]
        entries.push(EngineEntry {
            name: "ocrs",
            description: "Pure Rust OCR engine",
            status: EngineStatus::NotInstalled,
            gpu_enabled: false,
        });

        #[cfg(feature = "engine-tesseract")]
        {
            tracing::info!("Initializing tesseract engine...");
            match tesseract::TesseractEngine::new(config) {
                Ok(engine) => {
                    let engine = Arc::new(engine);
                    entries.push(EngineEntry {
                        name: engine.name(),
                        description: engine.description(),
                        status: EngineStatus::Available,
                        gpu_enabled: engine.gpu_enabled(),
                    });
                    engines.push(engine);
                }
                Err(e) => {
                    tracing::error!("tesseract engine initialization failed: {}", e);
                    entries.push(EngineEntry {
                        name: "tesseract",
                        description: tesseract::DESCRIPTION,
                        status: EngineStatus::Error(e.to_string()),
                        gpu_enabled: false,
                    });
                }
            }
        }
        #[cfg(not(feature = "engine-tesseract"))]
        entries.push(EngineEntry {
            name: "tesseract",
            description: "Tesseract OCR engine",
            status: EngineStatus::NotInstalled,
            gpu_enabled: false,
        });

        let _ = config;

        if engines.is_empty() {
            tracing::warn!(
                "No OCR engine came up; recognition requests will fail until restart"
            );
        }

        Self { engines, entries }
    }

    /// Build a registry from pre-constructed engines. Used by embedders and
    /// tests that inject their own backends.
    pub fn with_engines(engines: Vec<Arc<dyn TextEngine>>) -> Self {
        let entries = engines
            .iter()
            .map(|e| EngineEntry {
                name: e.name(),
                description: e.description(),
                status: EngineStatus::Available,
                gpu_enabled: e.gpu_enabled(),
            })
            .collect();
        Self { engines, entries }
    }

    /// Engines that initialized successfully, in invocation priority order
    pub fn available(&self) -> &[Arc<dyn TextEngine>] {
        &self.engines
    }

    /// Boot-time status of every known engine, including the ones that are
    /// compiled out or failed to initialize
    pub fn entries(&self) -> &[EngineEntry] {
        &self.entries
    }

    /// Names of the engines that initialized successfully
    pub fn available_names(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.name()).collect()
    }
}
