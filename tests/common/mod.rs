#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::SeedableRng;

use mri_lens::layers::{Dense, Layer, MaxPool2d};
use mri_lens::network::ModelMetadata;
use mri_lens::{ActivationFunction, ClassifierKind, Matrix, Network, TumorClassifier};

/// 299x299 classifier whose biases put ~0.87 on Glioma. The dense weights
/// are tiny but non-zero so the input gradient is not degenerate.
pub fn glioma_classifier() -> TumorClassifier {
    classifier_with_weight_scale(1e-3)
}

/// Same layout with all-zero weights: the input gradient vanishes.
pub fn flat_gradient_classifier() -> TumorClassifier {
    classifier_with_weight_scale(0.0)
}

fn classifier_with_weight_scale(scale: f64) -> TumorClassifier {
    let kind = ClassifierKind::TransferLearned;
    // 299 / 13 pooling leaves a 23x23x3 map.
    let features = 23 * 23 * 3;
    let mut rng = StdRng::seed_from_u64(7);
    let weights = if scale == 0.0 {
        Matrix::zeros(features, 4)
    } else {
        Matrix::normal(features, 4, scale, &mut rng)
    };
    let rest = (0.13f64 / 3.0).ln();
    let network = Network::new(vec![
        Layer::MaxPool2d(MaxPool2d::new(13)),
        Layer::Flatten,
        Layer::Dense(Dense {
            size: 4,
            weights,
            biases: Matrix::from_data(vec![vec![0.87f64.ln(), rest, rest, rest]]),
            activator: ActivationFunction::Softmax,
        }),
    ])
    .with_metadata(ModelMetadata { input_type: Some(kind.input_type()), ..Default::default() });

    TumorClassifier::new(kind, network).unwrap()
}

/// A synthetic "scan": a bright disc on a dark background.
pub fn synthetic_scan(width: u32, height: u32) -> RgbImage {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let r = width.min(height) as f64 * 0.4;
    RgbImage::from_fn(width, height, |x, y| {
        let d = ((x as f64 - cx).powi(2) + (y as f64 - cy).powi(2)).sqrt();
        let v = if d < r { 60 + ((x * 7 + y * 3) % 150) as u8 } else { 5 };
        Rgb([v, v, v.saturating_add(10)])
    })
}

pub fn write_scan(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    synthetic_scan(width, height).save(&path).unwrap();
    path
}
