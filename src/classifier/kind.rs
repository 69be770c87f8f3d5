use serde::{Serialize, Deserialize};
use std::fmt;
use std::path::Path;

use crate::activation::activation::ActivationFunction;
use crate::config::LensConfig;
use crate::layers::Padding;
use crate::network::metadata::{InputType, ModelMetadata};
use crate::network::spec::{LayerSpec, NetworkSpec};

use super::label::TumorClass;

/// The two interchangeable classifier backends.
///
/// Both map an RGB image to four class probabilities; they differ only in
/// architecture and expected input resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Pretrained feature-extraction backbone with a small trainable head.
    TransferLearned,
    /// Independently structured convolutional network.
    CustomCnn,
}

impl ClassifierKind {
    /// Expected input resolution as `(width, height)`.
    pub fn input_size(self) -> (u32, u32) {
        match self {
            ClassifierKind::TransferLearned => (299, 299),
            ClassifierKind::CustomCnn => (224, 224),
        }
    }

    pub fn input_type(self) -> InputType {
        let (width, height) = self.input_size();
        InputType::ImageRgb { width, height }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ClassifierKind::TransferLearned => "Transfer Learning - Xception",
            ClassifierKind::CustomCnn => "Custom CNN",
        }
    }

    pub fn weights_path(self, config: &LensConfig) -> &Path {
        match self {
            ClassifierKind::TransferLearned => &config.transfer_weights,
            ClassifierKind::CustomCnn => &config.custom_weights,
        }
    }

    /// Reference architecture for this backend.
    pub fn architecture(self) -> NetworkSpec {
        let relu = ActivationFunction::ReLU;
        let conv = |filters, stride, padding| LayerSpec::Conv2d {
            filters,
            kernel_size: 3,
            stride,
            padding,
            activation: relu.clone(),
        };

        let layers = match self {
            ClassifierKind::TransferLearned => vec![
                // Backbone (frozen, max-pooled features).
                conv(8, 2, Padding::Valid),
                conv(16, 1, Padding::Same),
                LayerSpec::MaxPool2d { pool_size: 2 },
                conv(32, 1, Padding::Same),
                LayerSpec::MaxPool2d { pool_size: 2 },
                conv(64, 1, Padding::Same),
                LayerSpec::GlobalMaxPool,
                // Head.
                LayerSpec::Flatten,
                LayerSpec::Dropout { rate: 0.3 },
                LayerSpec::Dense { size: 128, activation: relu.clone() },
                LayerSpec::Dropout { rate: 0.25 },
                LayerSpec::Dense { size: TumorClass::COUNT, activation: ActivationFunction::Softmax },
            ],
            ClassifierKind::CustomCnn => vec![
                conv(16, 1, Padding::Same),
                LayerSpec::MaxPool2d { pool_size: 2 },
                conv(32, 1, Padding::Same),
                LayerSpec::MaxPool2d { pool_size: 2 },
                conv(64, 1, Padding::Same),
                LayerSpec::MaxPool2d { pool_size: 2 },
                conv(64, 1, Padding::Same),
                LayerSpec::MaxPool2d { pool_size: 2 },
                LayerSpec::Flatten,
                LayerSpec::Dropout { rate: 0.25 },
                LayerSpec::Dense { size: 64, activation: relu.clone() },
                LayerSpec::Dropout { rate: 0.25 },
                LayerSpec::Dense { size: TumorClass::COUNT, activation: ActivationFunction::Softmax },
            ],
        };

        NetworkSpec {
            name: match self {
                ClassifierKind::TransferLearned => "xception_model".into(),
                ClassifierKind::CustomCnn => "cnn_model".into(),
            },
            input: self.input_type(),
            layers,
            metadata: Some(ModelMetadata {
                description: Some(self.display_name().into()),
                input_type: Some(self.input_type()),
                output_labels: Some(TumorClass::ALL.iter().map(|c| c.label().to_owned()).collect()),
            }),
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tensor::Shape;

    #[test]
    fn test_input_resolution_per_backend() {
        assert_eq!(ClassifierKind::TransferLearned.input_size(), (299, 299));
        assert_eq!(ClassifierKind::CustomCnn.input_size(), (224, 224));
    }

    #[test]
    fn test_architectures_end_in_four_classes() {
        for kind in [ClassifierKind::TransferLearned, ClassifierKind::CustomCnn] {
            let spec = kind.architecture();
            assert_eq!(spec.input, kind.input_type());
            assert_eq!(spec.output_shape().unwrap(), Shape::vector(TumorClass::COUNT), "{}", kind);
        }
    }

    #[test]
    fn test_weights_path_follows_config() {
        let config = LensConfig::default();
        assert_eq!(ClassifierKind::CustomCnn.weights_path(&config), config.custom_weights.as_path());
    }
}
