use crate::config::Config;
use crate::engines::EngineRegistry;
use crate::error::OcrError;
use crate::ocr::OcrProcessor;
use crate::preprocessing::{self, Pipeline, Profile};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<OcrProcessor>,
    pub config: Arc<Config>,
}

/// Recognition response for the scoring service
#[derive(Serialize)]
pub struct OcrResponse {
    pub text: String,
    pub confidence: f32,
    pub provider: String,
    /// Seconds from first engine invocation to the end of fusion
    pub processing_time: f64,
    pub language: String,
    /// Preprocessing degradation notes, empty on a clean run
    pub warnings: Vec<String>,
    /// Set only for the all-engines-empty failure marker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One item of a batch recognition response
#[derive(Serialize)]
pub struct BatchItemResponse {
    pub filename: String,
    #[serde(flatten)]
    pub result: OcrResponse,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItemResponse>,
}

/// Per-engine capability entry
#[derive(Serialize)]
pub struct EngineStatusResponse {
    pub name: String,
    pub description: String,
    /// "available", "not_installed" or "error"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub gpu_enabled: bool,
}

#[derive(Serialize)]
pub struct EnginesResponse {
    pub engines: Vec<EngineStatusResponse>,
    pub gpu_requested: bool,
    pub default_language: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// One parsed multipart upload
struct UploadedImage {
    filename: String,
    data: Vec<u8>,
}

struct OcrRequest {
    images: Vec<UploadedImage>,
    language: Option<String>,
    enhance_handwriting: bool,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;
    Router::new()
        .route("/ocr", post(handle_ocr))
        .route("/ocr/batch", post(handle_ocr_batch))
        .route("/quality", post(handle_quality))
        .route("/engines", get(handle_engines))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let registry = EngineRegistry::new(&config);
    tracing::info!("Engines available: {:?}", registry.available_names());

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        processor: Arc::new(OcrProcessor::new(registry)),
        config: Arc::new(config),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Parse the multipart form shared by the recognition endpoints
async fn parse_ocr_request(
    mut multipart: Multipart,
    max_file_size: usize,
) -> Result<OcrRequest, OcrError> {
    let mut images = Vec::new();
    let mut language: Option<String> = None;
    let mut enhance_handwriting = true;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| OcrError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "image" | "images" | "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Failed to read image data: {}", e))
                })?;
                if data.len() > max_file_size {
                    return Err(OcrError::ImageTooLarge {
                        size: data.len(),
                        max: max_file_size,
                    });
                }
                images.push(UploadedImage {
                    filename,
                    data: data.to_vec(),
                });
            }
            "language" => {
                language = Some(field.text().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Invalid language field: {}", e))
                })?);
            }
            "enhance_handwriting" => {
                let raw = field.text().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Invalid enhance_handwriting field: {}", e))
                })?;
                enhance_handwriting = matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes");
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    if images.is_empty() {
        return Err(OcrError::MissingFile);
    }

    Ok(OcrRequest {
        images,
        language,
        enhance_handwriting,
    })
}

/// Normalize one upload and run the engine chain over it
fn recognize_upload(
    state: &AppState,
    data: &[u8],
    profile: Profile,
    language: Option<&str>,
) -> Result<OcrResponse, OcrError> {
    let decoded = preprocessing::decode(data)?;

    let outcome = Pipeline::new(profile).normalize(decoded);
    tracing::debug!(
        "Preprocessing ({}) took {}ms, {} warnings",
        profile.as_str(),
        outcome.total_time_ms,
        outcome.warnings.len()
    );

    let language_name = language
        .unwrap_or(&state.config.default_language)
        .to_string();

    let start = Instant::now();
    match state.processor.extract(&outcome.image, profile, language) {
        Ok(result) => {
            tracing::info!(
                "OCR completed in {:.2}s, provider: {}, confidence: {:.2}, text length: {}",
                result.processing_time,
                result.provider,
                result.confidence,
                result.text.len()
            );
            Ok(OcrResponse {
                text: result.text,
                confidence: result.confidence,
                provider: result.provider,
                processing_time: result.processing_time,
                language: language_name,
                warnings: outcome.warnings,
                error: None,
            })
        }
        // Explicit failure marker: distinguishable from a legitimate
        // empty-transcription success by the error field and provider
        Err(OcrError::AllEnginesEmpty(diagnostic)) => {
            tracing::warn!("OCR produced no text: {}", diagnostic);
            Ok(OcrResponse {
                text: String::new(),
                confidence: 0.0,
                provider: "none".to_string(),
                processing_time: start.elapsed().as_secs_f64(),
                language: language_name,
                warnings: outcome.warnings,
                error: Some(format!("No OCR engine produced text: {}", diagnostic)),
            })
        }
        Err(e) => Err(e),
    }
}

/// Handle single-image OCR requests
async fn handle_ocr(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OcrResponse>, OcrError> {
    let request = parse_ocr_request(multipart, state.config.max_file_size).await?;
    let profile = Profile::from_handwriting_flag(request.enhance_handwriting);

    let image = request
        .images
        .first()
        .ok_or(OcrError::MissingFile)?;

    let response = recognize_upload(&state, &image.data, profile, request.language.as_deref())?;
    Ok(Json(response))
}

/// Handle batch OCR requests; items are processed sequentially and failures
/// are reported per item
async fn handle_ocr_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<BatchResponse>, OcrError> {
    let request = parse_ocr_request(multipart, state.config.max_file_size).await?;
    let profile = Profile::from_handwriting_flag(request.enhance_handwriting);

    let mut results = Vec::with_capacity(request.images.len());
    for image in &request.images {
        let result =
            match recognize_upload(&state, &image.data, profile, request.language.as_deref()) {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Batch item {} failed: {}", image.filename, e);
                    OcrResponse {
                        text: String::new(),
                        confidence: 0.0,
                        provider: "none".to_string(),
                        processing_time: 0.0,
                        language: request
                            .language
                            .clone()
                            .unwrap_or_else(|| state.config.default_language.clone()),
                        warnings: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            };
        results.push(BatchItemResponse {
            filename: image.filename.clone(),
            result,
        });
    }

    Ok(Json(BatchResponse { results }))
}

/// Handle image quality analysis requests
async fn handle_quality(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, OcrError> {
    let request = parse_ocr_request(multipart, state.config.max_file_size).await?;
    let image = request
        .images
        .first()
        .ok_or(OcrError::MissingFile)?;

    let decoded = preprocessing::decode(&image.data)?;
    Ok(Json(preprocessing::analyze(&decoded)))
}

/// Handle engine capability requests; state is fixed at startup and never
/// re-probed here
async fn handle_engines(State(state): State<AppState>) -> impl IntoResponse {
    let engines = state
        .processor
        .registry()
        .entries()
        .iter()
        .map(|entry| EngineStatusResponse {
            name: entry.name.to_string(),
            description: entry.description.to_string(),
            status: entry.status.as_str().to_string(),
            detail: match &entry.status {
                crate::engine::EngineStatus::Error(message) => Some(message.clone()),
                _ => None,
            },
            gpu_enabled: entry.gpu_enabled,
        })
        .collect();

    Json(EnginesResponse {
        engines,
        gpu_requested: state.config.use_gpu,
        default_language: state.config.default_language.clone(),
    })
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
