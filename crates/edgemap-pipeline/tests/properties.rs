//! Integration tests: whole-pipeline properties on synthetic rasters.

#![allow(clippy::unwrap_used)]

use edgemap_pipeline::{
    BorderMode, DynamicImage, FilterConfig, GrayImage, RasterBuffer, blur, detect_edges, edge,
    run_pipeline,
};

/// Deterministic noise so every run sees the same pixels.
fn noise(width: u32, height: u32, seed: u32) -> RasterBuffer {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    RasterBuffer::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state.to_le_bytes()[0]
    })
    .unwrap()
}

/// Left `split` columns are 0, the rest 255.
fn step(width: u32, height: u32, split: u32) -> RasterBuffer {
    RasterBuffer::from_fn(width, height, |x, _| if x < split { 0 } else { 255 }).unwrap()
}

fn config(threshold: f64, invert: bool, border: BorderMode) -> FilterConfig {
    FilterConfig {
        threshold,
        invert,
        border,
    }
}

const BORDERS: [BorderMode; 2] = [BorderMode::Omit, BorderMode::Replicate];

#[test]
fn output_dimensions_match_input() {
    for (width, height) in [(1, 1), (1, 7), (7, 1), (2, 3), (31, 17)] {
        for border in BORDERS {
            let input = noise(width, height, width * 100 + height);
            let edges = detect_edges(&input, &config(50.0, false, border)).unwrap();
            assert_eq!(edges.dimensions(), input.dimensions(), "{width}x{height} {border}");
        }
    }
}

#[test]
fn output_is_binary() {
    for seed in 1..6 {
        for border in BORDERS {
            for threshold in [0.0, 10.0, 50.0, 500.0] {
                let input = noise(19, 13, seed);
                let cfg = config(threshold, seed % 2 == 0, border);
                let edges = detect_edges(&input, &cfg).unwrap();
                assert!(
                    edges.pixels().iter().all(|&p| p == 0 || p == 255),
                    "non-binary pixel (seed {seed}, threshold {threshold}, {border})"
                );
            }
        }
    }
}

#[test]
fn invert_is_pixelwise_complement() {
    for border in BORDERS {
        let input = noise(23, 11, 7);
        let normal = detect_edges(&input, &config(80.0, false, border)).unwrap();
        let inverted = detect_edges(&input, &config(80.0, true, border)).unwrap();
        for (a, b) in normal.pixels().iter().zip(inverted.pixels()) {
            assert_eq!(u16::from(*a) + u16::from(*b), 255);
        }
    }
}

#[test]
fn zero_threshold_marks_everything() {
    let input = noise(9, 9, 3);
    let edges = detect_edges(&input, &config(0.0, false, BorderMode::Omit)).unwrap();
    assert!(edges.pixels().iter().all(|&p| p == edge::edge_value(false)));
}

#[test]
fn huge_threshold_marks_nothing() {
    let input = noise(9, 9, 4);
    let edges = detect_edges(&input, &config(1.0e9, true, BorderMode::Omit)).unwrap();
    assert!(edges.pixels().iter().all(|&p| p == edge::background_value(true)));
}

#[test]
fn blur_of_white_3x3() {
    let white = RasterBuffer::from_fn(3, 3, |_, _| 255).unwrap();
    let blurred = blur::box_blur(&white, BorderMode::Omit);
    assert_eq!(
        blurred.pixels(),
        &[113, 170, 113, 170, 255, 170, 113, 170, 113]
    );
}

#[test]
fn blur_of_5x5_step() {
    let blurred = blur::box_blur(&step(5, 5, 2), BorderMode::Omit);
    for y in 0..5 {
        let row: Vec<u8> = (0..5).map(|x| blurred.get(x, y).unwrap()).collect();
        if y == 0 || y == 4 {
            assert_eq!(row, [0, 56, 113, 170, 113], "row {y}");
        } else {
            assert_eq!(row, [0, 85, 170, 255, 170], "row {y}");
        }
    }
}

#[test]
fn sobel_on_5x5_step_marks_the_transition() {
    let input = step(5, 5, 2);
    let edges = detect_edges(&input, &config(10.0, false, BorderMode::Omit)).unwrap();
    for y in 0..5 {
        assert_eq!(edges.get(1, y), Some(0), "column 1 row {y}");
        assert_eq!(edges.get(2, y), Some(0), "column 2 row {y}");
    }
    // Blurred columns 2 and 4 are both 170 on the middle row.
    assert_eq!(edges.get(3, 2), Some(255));
}

#[test]
fn flat_regions_of_12x12_step_are_background() {
    let input = step(12, 12, 6);
    let edges = detect_edges(&input, &FilterConfig::default()).unwrap();
    for y in 2..=9 {
        for x in (1..=3).chain(8..=9) {
            assert_eq!(edges.get(x, y), Some(255), "flat pixel ({x}, {y})");
        }
        assert_eq!(edges.get(5, y), Some(0), "step pixel (5, {y})");
        assert_eq!(edges.get(6, y), Some(0), "step pixel (6, {y})");
    }
}

#[test]
fn flat_raster_interior_is_background_with_omit() {
    let flat = RasterBuffer::from_fn(8, 6, |_, _| 100).unwrap();
    let blurred = blur::box_blur(&flat, BorderMode::Omit);
    let magnitudes = edge::magnitude_map(&blurred, BorderMode::Omit);
    // Blur darkens the outer ring and Sobel reads one ring further in.
    for y in 2..4 {
        for x in 2..6 {
            assert!(magnitudes.get(x, y).unwrap().abs() < f64::EPSILON, "({x}, {y})");
        }
    }
    assert!(magnitudes.get(0, 0).unwrap() > 0.0);
}

#[test]
fn flat_raster_is_background_everywhere_with_replicate() {
    for value in [0, 100, 255] {
        let flat = RasterBuffer::from_fn(4, 4, |_, _| value).unwrap();
        let magnitudes = edge::magnitude_map(
            &blur::box_blur(&flat, BorderMode::Replicate),
            BorderMode::Replicate,
        );
        assert!(magnitudes.max().abs() < f64::EPSILON, "value {value}");
        let edges = detect_edges(&flat, &config(50.0, false, BorderMode::Replicate)).unwrap();
        assert!(edges.pixels().iter().all(|&p| p == 255), "value {value}");
    }
}

#[test]
fn flat_4x4_with_omit_has_darkened_border() {
    let flat = RasterBuffer::from_fn(4, 4, |_, _| 100).unwrap();
    let blurred = blur::box_blur(&flat, BorderMode::Omit);
    assert_eq!(blurred.get(0, 0), Some(44));
    assert_eq!(blurred.get(1, 0), Some(66));
    assert_eq!(blurred.get(1, 1), Some(100));

    let edges = detect_edges(&flat, &FilterConfig::default()).unwrap();
    assert!(edges.pixels().iter().all(|&p| p == 0));
}

#[test]
fn run_pipeline_uses_brightest_channel() {
    // Pure red on the left, pure blue on the right: identical intensity.
    let rgb = image::RgbImage::from_fn(10, 10, |x, _| {
        if x < 5 {
            image::Rgb([255, 0, 0])
        } else {
            image::Rgb([0, 0, 255])
        }
    });
    let color = DynamicImage::ImageRgb8(rgb);
    let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, image::Luma([255])));
    let config = FilterConfig::default();
    assert_eq!(
        run_pipeline(&color, &config).unwrap(),
        run_pipeline(&gray, &config).unwrap()
    );
}

#[test]
fn run_pipeline_leaves_input_untouched() {
    let input = DynamicImage::ImageLuma8(step(12, 12, 6).into_gray());
    let before = input.clone();
    let first = run_pipeline(&input, &FilterConfig::default()).unwrap();
    let second = run_pipeline(&input, &FilterConfig::default()).unwrap();
    assert_eq!(input, before);
    assert_eq!(first, second);
}
