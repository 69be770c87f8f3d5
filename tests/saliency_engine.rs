mod common;

use image::{Rgb, RgbImage};

use mri_lens::saliency::colormap::jet;
use mri_lens::saliency::ops::CircularMask;
use mri_lens::{
    Differentiable, LensError, Result, SaliencyConfig, SaliencyEngine, Shape, Tensor, TumorClass, Upload,
};
use mri_lens::preprocess::to_input_tensor;

/// Model whose gradient is a smooth off-centre blob, independent of the input.
struct BlobModel {
    shape: Shape,
}

impl Differentiable for BlobModel {
    fn scores(&self, _input: &Tensor) -> Result<Vec<f64>> {
        Ok(vec![0.25; 4])
    }

    fn input_gradient(&self, input: &Tensor, class_index: usize) -> Result<Tensor> {
        if class_index >= 4 {
            return Err(LensError::ClassIndex { index: class_index, classes: 4 });
        }
        let Shape { height, width, channels } = self.shape;
        let (cx, cy) = (width as f64 * 0.4, height as f64 * 0.55);
        let sigma = width as f64 / 8.0;
        let mut grad = Tensor::zeros(input.shape);
        for y in 0..height {
            for x in 0..width {
                let d2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
                let v = (-d2 / (2.0 * sigma * sigma)).exp();
                for c in 0..channels {
                    let idx = grad.index(y, x, c);
                    // Sign must not matter: channel 0 carries the negative.
                    grad.data[idx] = if c == 0 { -v } else { 0.5 * v };
                }
            }
        }
        Ok(grad)
    }
}

fn blob_setup(w: usize, h: usize) -> (BlobModel, Tensor) {
    let shape = Shape::new(h, w, 3);
    (BlobModel { shape }, Tensor::zeros(shape))
}

fn engine() -> SaliencyEngine {
    SaliencyEngine::new(SaliencyConfig::default()).unwrap()
}

#[test]
fn overlay_matches_target_size_and_unit_range() {
    let (model, input) = blob_setup(40, 40);
    let original = common::synthetic_scan(120, 90);
    let overlay = engine().compute_overlay(&model, &original, &input, 0, (120, 90)).unwrap();

    assert_eq!((overlay.gradient_map.cols, overlay.gradient_map.rows), (120, 90));
    assert_eq!(overlay.heatmap.dimensions(), (120, 90));
    assert_eq!(overlay.image.dimensions(), (120, 90));
    assert!(overlay.normalized);
    assert!(overlay.gradient_map.values().all(|v| (0.0..=1.0).contains(&v)));
    let (_, max) = overlay.gradient_map.min_max().unwrap();
    assert!((max - 1.0).abs() < 1e-12);
}

#[test]
fn pixels_outside_mask_stay_zero() {
    let (model, input) = blob_setup(32, 32);
    let original = common::synthetic_scan(100, 100);
    let overlay = engine().compute_overlay(&model, &original, &input, 1, (100, 100)).unwrap();

    let mask = CircularMask::for_field(100, 100, SaliencyConfig::default().mask_margin);
    for y in 0..100 {
        for x in 0..100 {
            if !mask.contains(x, y) {
                assert_eq!(overlay.gradient_map.data[y][x], 0.0, "({}, {})", x, y);
            }
        }
    }
}

#[test]
fn threshold_keeps_at_most_a_fifth_of_the_mask() {
    let (model, input) = blob_setup(48, 48);
    let original = common::synthetic_scan(160, 160);
    let overlay = engine().compute_overlay(&model, &original, &input, 2, (160, 160)).unwrap();

    let mask = CircularMask::for_field(160, 160, SaliencyConfig::default().mask_margin);
    let masked = mask.masked_values(&overlay.gradient_map);
    let nonzero = masked.iter().filter(|v| **v > 0.0).count();
    let share = nonzero as f64 / masked.len() as f64;
    assert!(share > 0.0 && share <= 0.21, "share = {}", share);
}

#[test]
fn repeated_runs_are_identical() {
    let (model, input) = blob_setup(30, 30);
    let original = common::synthetic_scan(64, 80);
    let a = engine().compute_overlay(&model, &original, &input, 3, (64, 80)).unwrap();
    let b = engine().compute_overlay(&model, &original, &input, 3, (64, 80)).unwrap();
    assert_eq!(a.gradient_map, b.gradient_map);
    assert_eq!(a.image, b.image);
}

#[test]
fn out_of_range_class_is_rejected() {
    let (model, input) = blob_setup(16, 16);
    let original = common::synthetic_scan(16, 16);
    let err = engine().compute_overlay(&model, &original, &input, 4, (16, 16)).unwrap_err();
    assert!(matches!(err, LensError::ClassIndex { index: 4, classes: 4 }));
}

#[test]
fn zero_gradient_yields_plain_blend_of_jet_floor() {
    let classifier = common::flat_gradient_classifier();
    let original = RgbImage::from_pixel(64, 48, Rgb([100, 150, 200]));
    let input = to_input_tensor(&original, classifier.input_type()).unwrap();
    let overlay = engine().compute_overlay(&classifier, &original, &input, 0, (64, 48)).unwrap();

    assert!(!overlay.normalized);
    assert!(overlay.gradient_map.values().all(|v| v == 0.0));

    let config = SaliencyConfig::default();
    let floor = jet(0).0;
    let o = [100.0, 150.0, 200.0];
    let expected: Vec<u8> = (0..3)
        .map(|c| (config.heatmap_weight * floor[c] as f64 + config.image_weight * o[c]).clamp(0.0, 255.0) as u8)
        .collect();
    for p in overlay.image.pixels() {
        assert_eq!(p.0.to_vec(), expected);
    }
}

#[test]
fn large_scan_through_transfer_classifier() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_scan(dir.path(), "scan.png", 512, 512);
    let upload = Upload::from_path(&path).unwrap();
    let original = upload.decode().unwrap();

    let classifier = common::glioma_classifier();
    let input = to_input_tensor(&original, classifier.input_type()).unwrap();
    assert_eq!(input.shape, Shape::new(299, 299, 3));

    let prediction = classifier.predict(&input).unwrap();
    assert_eq!(prediction.class, TumorClass::Glioma);
    assert_eq!(prediction.class.to_string(), "Glioma");
    assert!((prediction.confidence - 0.87).abs() < 0.05, "{}", prediction.confidence);

    let overlay = engine()
        .compute_overlay(&classifier, &original, &input, prediction.class_index(), original.dimensions())
        .unwrap();
    assert_eq!(overlay.image.dimensions(), (512, 512));
    assert!(overlay.normalized);
    assert!(overlay.gradient_map.values().any(|v| v > 0.0));
}
