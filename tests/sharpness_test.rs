//! Sharpness evaluation on synthetic and JPEG round-tripped frames

use image::{DynamicImage, Rgb, RgbImage};
use stockcam::invariant_ppt::{contract_test, contracts};
use stockcam::quality::{evaluate, SharpnessEvaluator, DEFAULT_SHARPNESS_THRESHOLD};
use stockcam::testing::{blurry_frame, encode_frame, sharp_frame, textured_frame};

#[test]
fn test_sharp_frame_passes_default_threshold() {
    let report = evaluate(&sharp_frame(1280, 960), DEFAULT_SHARPNESS_THRESHOLD);
    println!("sharp score: {:.2}", report.score);
    assert!(report.is_sharp);
    assert!(!report.skipped);
    assert_eq!(report.crop_side, 163);
}

#[test]
fn test_blurry_frame_fails_default_threshold() {
    let report = evaluate(&blurry_frame(1280, 960), DEFAULT_SHARPNESS_THRESHOLD);
    println!("blurry score: {:.2}", report.score);
    assert!(!report.is_sharp);
    assert!(report.score < 50.0);
}

#[test]
fn test_classification_survives_jpeg() {
    let evaluator = SharpnessEvaluator::default();
    for (frame, expect_sharp) in [(sharp_frame(800, 600), true), (blurry_frame(800, 600), false)] {
        let bytes = encode_frame(&frame, 92).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        let report = evaluator.evaluate_dynamic(&decoded);
        println!("jpeg score: {:.2}", report.score);
        assert_eq!(report.is_sharp, expect_sharp);
    }
}

#[test]
fn test_threshold_is_strict() {
    let frame = textured_frame(600, 600, 60);
    let score = evaluate(&frame, 0.0).score;
    assert!(score > 0.0);
    // Equal to the threshold is not sharp
    assert!(!evaluate(&frame, score).is_sharp);
    assert!(evaluate(&frame, score - 1e-6).is_sharp);
}

#[test]
fn test_window_capped_at_768() {
    let evaluator = SharpnessEvaluator::default();
    assert_eq!(evaluator.analysis_side(6000, 8000), 768);
    assert_eq!(evaluator.analysis_side(4518, 4518), 768);
    assert_eq!(evaluator.analysis_side(4000, 3000), 510);
}

#[test]
fn test_only_center_is_analysed() {
    // Sharp border, flat center
    let mut frame = sharp_frame(1000, 1000);
    for y in 300..700 {
        for x in 300..700 {
            frame.put_pixel(x, y, Rgb([128, 128, 128]));
        }
    }
    let report = evaluate(&frame, DEFAULT_SHARPNESS_THRESHOLD);
    assert_eq!(report.score, 0.0);
    assert!(!report.is_sharp);
}

#[test]
fn test_tiny_images_are_accepted_unchecked() {
    for (w, h) in [(1, 1), (10, 400), (187, 187)] {
        let frame = RgbImage::from_pixel(w, h, Rgb([0, 0, 0]));
        let report = evaluate(&frame, f64::MAX);
        assert!(report.skipped, "{}x{} should skip", w, h);
        assert!(report.is_sharp);
    }
    // 0.17 * 189 = 32.13 -> 32px, just large enough
    let frame = RgbImage::from_pixel(189, 189, Rgb([0, 0, 0]));
    assert!(!evaluate(&frame, 1.0).skipped);
}

#[test]
fn test_grayscale_input() {
    let rgb = sharp_frame(500, 500);
    let gray = DynamicImage::ImageRgb8(rgb.clone()).grayscale();
    let evaluator = SharpnessEvaluator::default();
    assert!(evaluator.evaluate_dynamic(&gray).is_sharp);
}

#[test]
fn contract_sharpness_window() {
    let _ = evaluate(&sharp_frame(640, 480), DEFAULT_SHARPNESS_THRESHOLD);
    contract_test("sharpness window", &[contracts::ANALYSIS_WINDOW_INSIDE]);
}
