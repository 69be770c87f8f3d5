use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{LensError, Result};
use crate::layers::Layer;
use crate::math::tensor::{Shape, Tensor};
use crate::network::metadata::{InputType, ModelMetadata};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
}

impl Network {
    pub fn new(layers: Vec<Layer>) -> Network {
        Network { layers, metadata: None }
    }

    pub fn with_metadata(mut self, metadata: ModelMetadata) -> Network {
        self.metadata = Some(metadata);
        self
    }

    pub fn input_type(&self) -> Option<InputType> {
        self.metadata.as_ref().and_then(|m| m.input_type)
    }

    /// Walks the layer chain from `input` and returns the final shape, or the
    /// first layer that cannot accept its predecessor's output.
    pub fn output_shape(&self, input: Shape) -> Result<Shape> {
        self.layers.iter().enumerate().try_fold(input, |shape, (i, layer)| {
            layer.output_shape(shape).map_err(|e| {
                LensError::Shape(format!("layer {} ({}): {}", i, layer.name(), e))
            })
        })
    }

    /// Inference-only forward pass.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut current = input.clone();
        for layer in &self.layers {
            current = layer.forward(&current)?.output;
        }
        Ok(current)
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Network> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
