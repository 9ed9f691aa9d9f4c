//! Router-level tests with injected engine registries; no network, no
//! model downloads.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use image::{DynamicImage, GrayImage, Luma};
use scriptscan_ocr_server::config::Config;
use scriptscan_ocr_server::engine::{Observation, TextEngine};
use scriptscan_ocr_server::engines::EngineRegistry;
use scriptscan_ocr_server::error::OcrError;
use scriptscan_ocr_server::ocr::OcrProcessor;
use scriptscan_ocr_server::server::{router, AppState};
use std::sync::Arc;
use tower::util::ServiceExt;

const BOUNDARY: &str = "test-boundary-7b2e";

struct FixedEngine {
    text: &'static str,
    confidence: f32,
}

impl TextEngine for FixedEngine {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn description(&self) -> &'static str {
        "returns a fixed transcription"
    }

    fn detect(
        &self,
        _image: &DynamicImage,
        _language: Option<&str>,
    ) -> Result<Observation, OcrError> {
        Ok(Observation {
            text: self.text.to_string(),
            confidence: self.confidence,
            engine: "fixed",
        })
    }
}

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        default_language: "eng".to_string(),
        max_file_size: 10 * 1024 * 1024,
        use_gpu: false,
        model_dir: None,
        tessdata_path: None,
    }
}

fn app(engines: Vec<Arc<dyn TextEngine>>) -> axum::Router {
    let state = AppState {
        processor: Arc::new(OcrProcessor::new(EngineRegistry::with_engines(engines))),
        config: Arc::new(test_config()),
    };
    router(state)
}

fn sample_png() -> Vec<u8> {
    let img = GrayImage::from_fn(64, 64, |x, y| {
        if (16..48).contains(&x) && (28..36).contains(&y) {
            Luma([30])
        } else {
            Luma([220])
        }
    });
    let mut bytes = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut bytes);
    DynamicImage::ImageLuma8(img)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Hand-rolled multipart body: text fields plus optional image parts
fn multipart_body(fields: &[(&str, &str)], images: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    for (filename, data) in images {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let response = app(vec![])
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn engines_endpoint_reflects_boot_time_state() {
    let engine: Arc<dyn TextEngine> = Arc::new(FixedEngine {
        text: "x",
        confidence: 0.5,
    });
    let response = app(vec![engine])
        .oneshot(Request::get("/engines").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["engines"][0]["name"], "fixed");
    assert_eq!(json["engines"][0]["status"], "available");
    assert_eq!(json["engines"][0]["gpu_enabled"], false);
    assert_eq!(json["gpu_requested"], false);
}

#[tokio::test]
async fn ocr_without_image_field_is_rejected() {
    let body = multipart_body(&[("language", "eng")], &[]);
    let response = app(vec![])
        .oneshot(multipart_request("/ocr", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["code"], "MISSING_FILE");
}

#[tokio::test]
async fn ocr_with_undecodable_image_fails_fast() {
    let body = multipart_body(&[], &[("junk.png", b"not a real png".as_slice())]);
    let response = app(vec![])
        .oneshot(multipart_request("/ocr", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["code"], "DECODE_ERROR");
}

#[tokio::test]
async fn ocr_returns_engine_transcription() {
    let engine: Arc<dyn TextEngine> = Arc::new(FixedEngine {
        text: "newton's second law",
        confidence: 0.83,
    });
    let png = sample_png();
    let body = multipart_body(&[("enhance_handwriting", "true")], &[("page.png", &png)]);

    let response = app(vec![engine])
        .oneshot(multipart_request("/ocr", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["text"], "newton's second law");
    assert_eq!(json["provider"], "fixed");
    assert_eq!(json["language"], "eng");
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn ocr_without_engines_returns_failure_marker() {
    let png = sample_png();
    let body = multipart_body(&[], &[("page.png", &png)]);

    let response = app(vec![])
        .oneshot(multipart_request("/ocr", body))
        .await
        .unwrap();

    // The marker is a well-formed response, not a transport error
    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["text"], "");
    assert_eq!(json["confidence"], 0.0);
    assert_eq!(json["provider"], "none");
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn batch_reports_items_in_submission_order() {
    let engine: Arc<dyn TextEngine> = Arc::new(FixedEngine {
        text: "answer",
        confidence: 0.6,
    });
    let png = sample_png();
    let body = multipart_body(
        &[],
        &[
            ("first.png", png.as_slice()),
            ("second.png", b"broken bytes".as_slice()),
        ],
    );

    let response = app(vec![engine])
        .oneshot(multipart_request("/ocr/batch", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["filename"], "first.png");
    assert_eq!(results[0]["text"], "answer");
    assert_eq!(results[1]["filename"], "second.png");
    assert_eq!(results[1]["provider"], "none");
    assert!(results[1]["error"].is_string());
}

#[tokio::test]
async fn quality_endpoint_returns_report() {
    let png = sample_png();
    let body = multipart_body(&[], &[("page.png", &png)]);

    let response = app(vec![])
        .oneshot(multipart_request("/quality", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    let score = json["score"].as_u64().unwrap();
    assert!(score <= 100);
    assert!(json["level"].is_string());
    assert!(json["recommendations"].is_array());
}
