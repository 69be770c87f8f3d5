use std::path::Path;

use log::{debug, info};
use serde::Serialize;

use crate::error::{LensError, Result};
use crate::math::tensor::{Shape, Tensor};
use crate::network::metadata::InputType;
use crate::network::network::Network;
use crate::network::tape::Differentiable;

use super::kind::ClassifierKind;
use super::label::TumorClass;

/// One classification result. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub probabilities: [f64; TumorClass::COUNT],
    pub class: TumorClass,
    pub confidence: f64,
}

impl Prediction {
    pub fn from_scores(scores: &[f64]) -> Result<Prediction> {
        let probabilities: [f64; TumorClass::COUNT] = scores.try_into().map_err(|_| {
            LensError::Model(format!("expected {} class scores, got {}", TumorClass::COUNT, scores.len()))
        })?;
        // Ties resolve to the lowest index.
        let (best, confidence) = probabilities.iter().copied().enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });
        let class = TumorClass::from_index(best)
            .ok_or(LensError::ClassIndex { index: best, classes: TumorClass::COUNT })?;
        Ok(Prediction { probabilities, class, confidence })
    }

    pub fn class_index(&self) -> usize {
        self.class.index()
    }

    /// `(class, probability)` pairs in output order.
    pub fn ranked(&self) -> impl Iterator<Item = (TumorClass, f64)> + '_ {
        TumorClass::ALL.iter().copied().zip(self.probabilities.iter().copied())
    }
}

/// A loaded backend: the network plus the kind it was validated against.
#[derive(Debug, Clone)]
pub struct TumorClassifier {
    kind: ClassifierKind,
    network: Network,
}

impl TumorClassifier {
    /// Wraps `network` after checking it fits `kind`: matching input
    /// resolution, a consistent layer chain, and four outputs.
    pub fn new(kind: ClassifierKind, network: Network) -> Result<TumorClassifier> {
        let input = network.input_type().unwrap_or_else(|| kind.input_type());
        if input.dimensions() != kind.input_size() {
            let (w, h) = input.dimensions();
            let (ew, eh) = kind.input_size();
            return Err(LensError::Model(format!(
                "{} expects {}x{} input, weights declare {}x{}", kind, ew, eh, w, h
            )));
        }
        let out = network.output_shape(input.shape())?;
        if out != Shape::vector(TumorClass::COUNT) {
            return Err(LensError::Model(format!(
                "{} must produce {} class scores, weights produce {}", kind, TumorClass::COUNT, out
            )));
        }
        Ok(TumorClassifier { kind, network })
    }

    pub fn load<P: AsRef<Path>>(kind: ClassifierKind, path: P) -> Result<TumorClassifier> {
        let path = path.as_ref();
        info!("Loading {} weights from {:?}", kind, path);
        let network = Network::load_json(path)?;
        debug!("  {} layers", network.layers.len());
        TumorClassifier::new(kind, network)
    }

    pub fn kind(&self) -> ClassifierKind {
        self.kind
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn input_type(&self) -> InputType {
        self.network.input_type().unwrap_or_else(|| self.kind.input_type())
    }

    pub fn predict(&self, input: &Tensor) -> Result<Prediction> {
        self.check_input(input)?;
        Prediction::from_scores(&self.network.forward(input)?.data)
    }

    fn check_input(&self, input: &Tensor) -> Result<()> {
        let expected = self.input_type().shape();
        if input.shape != expected {
            return Err(LensError::Shape(format!(
                "{} expects a {} input tensor, got {}", self.kind, expected, input.shape
            )));
        }
        Ok(())
    }
}

impl Differentiable for TumorClassifier {
    fn scores(&self, input: &Tensor) -> Result<Vec<f64>> {
        self.check_input(input)?;
        self.network.scores(input)
    }

    fn input_gradient(&self, input: &Tensor, class_index: usize) -> Result<Tensor> {
        self.check_input(input)?;
        self.network.input_gradient(input, class_index)
    }
}
