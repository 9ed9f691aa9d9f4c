//! End-to-end preprocessing behavior over synthetic pages: decoding,
//! profile pipelines, size bounds, and quality analysis.

use image::{DynamicImage, GrayImage, Luma};
use scriptscan_ocr_server::error::OcrError;
use scriptscan_ocr_server::preprocessing::{self, Pipeline, Profile, QualityLevel, Readiness};

/// Light page with a few dark "text" bars
fn synthetic_page(width: u32, height: u32) -> DynamicImage {
    let img = GrayImage::from_fn(width, height, |x, y| {
        let in_margin = x < width / 10 || x > width - width / 10;
        let on_line = (y / (height / 8)) % 2 == 1 && (y % (height / 8)) < height / 24;
        if !in_margin && on_line {
            Luma([40])
        } else {
            Luma([215])
        }
    });
    DynamicImage::ImageLuma8(img)
}

fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut bytes);
    image.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
    bytes
}

#[test]
fn decode_rejects_invalid_bytes_before_recognition() {
    let result = preprocessing::decode(b"not an image at all");
    assert!(matches!(result, Err(OcrError::DecodeError(_))));
}

#[test]
fn decode_round_trips_png() {
    let page = synthetic_page(120, 96);
    let decoded = preprocessing::decode(&png_bytes(&page)).unwrap();
    assert_eq!(decoded.width(), 120);
    assert_eq!(decoded.height(), 96);
}

#[test]
fn handwriting_profile_produces_clean_binary_bitmap() {
    let outcome = Pipeline::new(Profile::Handwriting).normalize(synthetic_page(240, 192));

    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    let gray = outcome.image.to_luma8();
    assert!(gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    // The page still contains ink after despeckling
    assert!(gray.pixels().any(|p| p.0[0] == 0));
}

#[test]
fn printed_profile_produces_clean_binary_bitmap() {
    let outcome = Pipeline::new(Profile::PrintedText).normalize(synthetic_page(240, 192));

    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    let gray = outcome.image.to_luma8();
    assert!(gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
}

#[test]
fn normalization_never_exceeds_profile_bounds() {
    // Wider than the handwriting limit; the pipeline may only downscale
    let outcome = Pipeline::new(Profile::Handwriting).normalize(synthetic_page(2400, 200));

    assert!(outcome.image.width() <= 2000);
    assert!(outcome.image.height() <= 200);
}

#[test]
fn normalization_never_upscales_small_images() {
    let outcome = Pipeline::new(Profile::PrintedText).normalize(synthetic_page(64, 48));

    assert_eq!(outcome.image.width(), 64);
    assert_eq!(outcome.image.height(), 48);
}

#[test]
fn normalization_is_deterministic_for_identical_input() {
    let a = Pipeline::new(Profile::Handwriting).normalize(synthetic_page(160, 128));
    let b = Pipeline::new(Profile::Handwriting).normalize(synthetic_page(160, 128));

    assert_eq!(a.image.to_luma8().as_raw(), b.image.to_luma8().as_raw());
}

#[test]
fn degraded_normalization_reports_warnings_and_still_yields_bitmap() {
    // Too small for the contrast step's tile grid
    let tiny = DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 6, Luma([200])));
    let outcome = Pipeline::new(Profile::Handwriting).normalize(tiny);

    assert!(!outcome.warnings.is_empty());
    assert_eq!(outcome.image.width(), 6);
    assert_eq!(outcome.image.height(), 6);
}

#[test]
fn quality_report_is_pure_and_in_range() {
    let page = synthetic_page(640, 480);

    let first = preprocessing::analyze(&page);
    let second = preprocessing::analyze(&page);

    assert_eq!(first, second);
    assert!(first.score <= 100);
    let expected = match first.score {
        s if s >= 80 => QualityLevel::Excellent,
        s if s >= 60 => QualityLevel::Good,
        s if s >= 40 => QualityLevel::Fair,
        _ => QualityLevel::Poor,
    };
    assert_eq!(first.level, expected);
}

#[test]
fn quality_readiness_follows_score_threshold() {
    let report = preprocessing::analyze(&synthetic_page(640, 480));
    let ready = report.score >= 60;
    assert_eq!(report.readiness == Readiness::Ready, ready);
}
