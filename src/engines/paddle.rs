//! Paddle engine implementation
//!
//! Handwriting-tuned backend running the PaddleOCR CRNN recognition model
//! through ONNX Runtime. The normalized bitmap is cut into text lines with a
//! horizontal projection profile, each line is recognized with CTC decoding,
//! and the observation confidence is the mean of the per-line scores.
//!
//! Model and character dictionary are downloaded on first use (RapidOCR's
//! ONNX export of ch_PP-OCRv4).

use crate::config::Config;
use crate::engine::{Observation, TextEngine};
use crate::error::OcrError;
use crate::preprocessing::Profile;
use image::{imageops, imageops::FilterType, DynamicImage, GrayImage};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DESCRIPTION: &str =
    "PaddleOCR recognition model via ONNX Runtime - tuned for handwriting";

const REC_MODEL_URL: &str =
    "https://github.com/RapidAI/RapidOcrOnnx/raw/main/models/ch_PP-OCRv4_rec_infer.onnx";
const REC_KEYS_URL: &str =
    "https://github.com/RapidAI/RapidOcrOnnx/raw/main/models/ppocr_keys_v1.txt";

const REC_MODEL_FILE: &str = "ch_PP-OCRv4_rec_infer.onnx";
const REC_KEYS_FILE: &str = "ppocr_keys_v1.txt";

/// Fixed input height of the recognition model
const MODEL_HEIGHT: u32 = 48;
/// Strips narrower than this after resizing carry no recognizable text
const MIN_STRIP_WIDTH: u32 = 8;

/// PaddleOCR-backed recognition engine
pub struct PaddleEngine {
    /// ONNX Runtime sessions take &mut to run, so concurrent requests
    /// serialize here
    session: Mutex<Session>,
    /// CTC character dictionary with blank and space tokens
    keys: Vec<String>,
    gpu: bool,
}

impl PaddleEngine {
    /// Create the engine, downloading model files if they are not cached
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let model_path = ensure_file_downloaded(config, REC_MODEL_URL, REC_MODEL_FILE)?;
        let keys_path = ensure_file_downloaded(config, REC_KEYS_URL, REC_KEYS_FILE)?;

        let session = build_session(&model_path, config.use_gpu).map_err(|e| {
            OcrError::InitializationError(format!("Failed to create ONNX session: {}", e))
        })?;

        let keys_content = std::fs::read_to_string(&keys_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to read character dictionary: {}", e))
        })?;
        let mut keys: Vec<String> = keys_content.lines().map(str::to_string).collect();
        // CTC blank token at index 0, space token at the end
        keys.insert(0, "#".to_string());
        keys.push(" ".to_string());

        tracing::info!(
            "paddle engine initialized ({} dictionary entries, gpu: {})",
            keys.len(),
            config.use_gpu
        );

        Ok(Self {
            session: Mutex::new(session),
            keys,
            gpu: config.use_gpu,
        })
    }

    /// Run the recognition model over one line strip
    fn recognize_strip(&self, strip: &GrayImage) -> Result<(String, f32), OcrError> {
        let call_failed = |message: String| OcrError::EngineCallFailed {
            engine: "paddle",
            message,
        };

        let (width, height) = strip.dimensions();
        let new_width = ((width * MODEL_HEIGHT) as f32 / height as f32) as u32;
        if new_width < MIN_STRIP_WIDTH {
            return Ok((String::new(), 0.0));
        }

        let resized = imageops::resize(strip, new_width, MODEL_HEIGHT, FilterType::Triangle);

        // NCHW tensor, grayscale replicated across the three channels,
        // normalized the way the model was trained: (v/255 - 0.5) / 0.5
        let w = new_width as usize;
        let h = MODEL_HEIGHT as usize;
        let mut data = vec![0.0f32; 3 * h * w];
        for y in 0..h {
            for x in 0..w {
                let v = resized.get_pixel(x as u32, y as u32).0[0] as f32;
                let normalized = (v / 255.0 - 0.5) / 0.5;
                data[y * w + x] = normalized;
                data[h * w + y * w + x] = normalized;
                data[2 * h * w + y * w + x] = normalized;
            }
        }

        let shape = [1usize, 3, h, w];
        let input_value = Value::from_array((shape.as_slice(), data))
            .map_err(|e| call_failed(format!("Failed to build input tensor: {}", e)))?;

        let (timesteps, vocab_size, output_data) = {
            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs!["x" => input_value])
                .map_err(|e| call_failed(format!("Inference failed: {}", e)))?;
            let output_tensor = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| call_failed(format!("Failed to extract output tensor: {}", e)))?;
            let output_shape = output_tensor.0;
            let timesteps = output_shape[1] as usize;
            let vocab_size = output_shape[2] as usize;
            (timesteps, vocab_size, output_tensor.1.to_vec())
        };

        Ok(decode_ctc(&output_data, timesteps, vocab_size, &self.keys))
    }
}

impl TextEngine for PaddleEngine {
    fn name(&self) -> &'static str {
        "paddle"
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn gpu_enabled(&self) -> bool {
        self.gpu
    }

    fn accepts(&self, profile: Profile) -> bool {
        matches!(profile, Profile::Handwriting)
    }

    fn detect(
        &self,
        image: &DynamicImage,
        _language: Option<&str>,
    ) -> Result<Observation, OcrError> {
        let gray = image.to_luma8();
        let bands = segment_lines(&gray);

        let mut texts = Vec::new();
        let mut scores = Vec::new();

        for (y0, y1) in bands {
            let strip = imageops::crop_imm(&gray, 0, y0, gray.width(), y1 - y0).to_image();
            let (text, score) = self.recognize_strip(&strip)?;
            if !text.trim().is_empty() {
                texts.push(text);
                scores.push(score);
            }
        }

        // Mean of the per-segment recognition scores
        let confidence = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f32>() / scores.len() as f32
        };

        Ok(Observation {
            text: texts.join(" "),
            confidence,
            engine: "paddle",
        })
    }
}

/// Greedy CTC decode: argmax per timestep, drop blanks (index 0) and
/// repeats, score the kept characters by their probability.
/// Returns the decoded text and the mean character score.
fn decode_ctc(output: &[f32], timesteps: usize, vocab_size: usize, keys: &[String]) -> (String, f32) {
    let mut text = String::new();
    let mut char_scores = Vec::new();
    let mut last_index = 0usize;

    for t in 0..timesteps {
        let frame = &output[t * vocab_size..(t + 1) * vocab_size];
        let mut max_index = 0usize;
        let mut max_value = f32::MIN;
        for (i, &p) in frame.iter().enumerate() {
            if p > max_value {
                max_value = p;
                max_index = i;
            }
        }

        if max_index > 0 && max_index < keys.len() && !(t > 0 && max_index == last_index) {
            text.push_str(&keys[max_index]);
            char_scores.push(max_value);
        }
        last_index = max_index;
    }

    let score = if char_scores.is_empty() {
        0.0
    } else {
        char_scores.iter().sum::<f32>() / char_scores.len() as f32
    };

    (text, score)
}

/// Cut the page into horizontal text bands with a projection profile.
///
/// Counts ink pixels per row, keeps runs of rows that clear a small ink
/// floor, and merges runs separated by gaps of up to two rows so broken
/// ascenders and descenders stay with their line.
fn segment_lines(gray: &GrayImage) -> Vec<(u32, u32)> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let min_ink = (width / 100).max(2);
    let mut inked: Vec<bool> = (0..height)
        .map(|y| {
            let count = (0..width)
                .filter(|&x| gray.get_pixel(x, y).0[0] < 128)
                .count() as u32;
            count >= min_ink
        })
        .collect();

    // Close gaps of up to 2 rows between inked runs
    for y in 1..height as usize - 1 {
        if !inked[y]
            && inked[y - 1]
            && (inked[y + 1] || (y + 2 < height as usize && inked[y + 2]))
        {
            inked[y] = true;
        }
    }

    let mut bands = Vec::new();
    let mut start: Option<u32> = None;
    for y in 0..height {
        match (inked[y as usize], start) {
            (true, None) => start = Some(y),
            (false, Some(s)) => {
                bands.push((s, y));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        bands.push((s, height));
    }

    // Pad each band by two rows and drop slivers too short to hold glyphs
    bands
        .into_iter()
        .map(|(s, e)| (s.saturating_sub(2), (e + 2).min(height)))
        .filter(|(s, e)| e - s >= 6)
        .collect()
}

/// Build the ONNX session, registering the CUDA execution provider when GPU
/// support was requested (with CPU fallback)
fn build_session(model_path: &Path, use_gpu: bool) -> Result<Session, ort::Error> {
    if use_gpu {
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers([
                CUDAExecutionProvider::default().build(),
                CPUExecutionProvider::default().build(),
            ])?
            .commit_from_file(model_path)
    } else {
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)
    }
}

/// Resolve a model file, preferring the configured model directory and
/// falling back to a cache-directory download
fn ensure_file_downloaded(
    config: &Config,
    url: &str,
    filename: &str,
) -> Result<PathBuf, OcrError> {
    if let Some(dir) = &config.model_dir {
        let local = Path::new(dir).join(filename);
        if local.exists() {
            tracing::info!("Using model file from {:?}", local);
            return Ok(local);
        }
    }

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("scriptscan-ocr");

    std::fs::create_dir_all(&cache_dir).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create cache directory: {}", e))
    })?;

    let file_path = cache_dir.join(filename);

    if !file_path.exists() {
        tracing::info!("Downloading {} (this may take a moment)...", filename);
        download_file(url, &file_path)?;
        tracing::info!("Downloaded {} to {:?}", filename, file_path);
    } else {
        tracing::info!("Using cached file from {:?}", file_path);
    }

    Ok(file_path)
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
