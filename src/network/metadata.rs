use serde::{Deserialize, Serialize};

use crate::math::tensor::Shape;

/// Describes how to interpret the input fed to a Network.
/// Stored in model JSON; preprocessing reads this to size the input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InputType {
    /// Grayscale image resized to width×height, normalized to [0, 1].
    ImageGrayscale { width: u32, height: u32 },
    /// RGB image resized to width×height, normalized to [0, 1], channels last.
    ImageRgb { width: u32, height: u32 },
}

impl InputType {
    pub fn dimensions(&self) -> (u32, u32) {
        match *self {
            InputType::ImageGrayscale { width, height } | InputType::ImageRgb { width, height } => (width, height),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            InputType::ImageGrayscale { .. } => 1,
            InputType::ImageRgb { .. } => 3,
        }
    }

    pub fn shape(&self) -> Shape {
        let (width, height) = self.dimensions();
        Shape::new(height as usize, width as usize, self.channels())
    }
}

/// Optional annotations attached to a saved Network.
/// All fields are Option<> so bare weight files deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelMetadata {
    pub description: Option<String>,
    pub input_type: Option<InputType>,
    /// Human-readable class labels for the output layer.
    pub output_labels: Option<Vec<String>>,
}
