use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{LensError, Result};
use crate::layers::{Conv2d, Dense, Layer, MaxPool2d, Padding};
use crate::math::tensor::Shape;
use crate::network::metadata::{InputType, ModelMetadata};
use crate::network::network::Network;

/// Describes one layer in a network specification, without weights.
///
/// Input sizes are not stored; `NetworkSpec::build` infers them by walking
/// the chain from the declared input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Conv2d {
        filters: usize,
        kernel_size: usize,
        #[serde(default = "default_stride")]
        stride: usize,
        padding: Padding,
        activation: ActivationFunction,
    },
    MaxPool2d { pool_size: usize },
    GlobalMaxPool,
    Flatten,
    Dropout { rate: f64 },
    Dense { size: usize, activation: ActivationFunction },
}

fn default_stride() -> usize {
    1
}

/// A fully serializable description of a network architecture plus its
/// metadata.
///
/// `NetworkSpec` can be saved to / loaded from JSON independently of the
/// weights, and instantiated with fresh initial weights via `build`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name used as the model file stem.
    pub name: String,
    pub input: InputType,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
}

impl NetworkSpec {
    /// Shape after the last layer, checked without allocating weights.
    pub fn output_shape(&self) -> Result<Shape> {
        self.layers.iter().try_fold(self.input.shape(), |shape, spec| match spec {
            LayerSpec::Conv2d { filters, kernel_size, stride, padding, activation } => {
                Conv2d {
                    filters: *filters,
                    kernel_size: *kernel_size,
                    in_channels: shape.channels,
                    stride: *stride,
                    padding: *padding,
                    kernels: vec![0.0; filters * kernel_size * kernel_size * shape.channels],
                    biases: vec![0.0; *filters],
                    activator: activation.clone(),
                }.output_shape(shape)
            }
            LayerSpec::MaxPool2d { pool_size } => MaxPool2d::new(*pool_size).output_shape(shape),
            LayerSpec::GlobalMaxPool => Ok(Shape::vector(shape.channels)),
            LayerSpec::Flatten => Ok(Shape::vector(shape.len())),
            LayerSpec::Dropout { .. } => Ok(shape),
            LayerSpec::Dense { size, .. } => {
                if shape.height != 1 || shape.width != 1 {
                    return Err(LensError::Shape(format!("dense layer needs a flat input, got {}", shape)));
                }
                Ok(Shape::vector(*size))
            }
        })
    }

    /// Instantiates the architecture with He/Xavier initial weights.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Network> {
        let mut shape = self.input.shape();
        let mut layers = Vec::with_capacity(self.layers.len());

        for spec in &self.layers {
            let layer = match spec {
                LayerSpec::Conv2d { filters, kernel_size, stride, padding, activation } => {
                    Layer::Conv2d(Conv2d::new(
                        *filters, *kernel_size, shape.channels, *stride, *padding, activation.clone(), rng,
                    ))
                }
                LayerSpec::MaxPool2d { pool_size } => Layer::MaxPool2d(MaxPool2d::new(*pool_size)),
                LayerSpec::GlobalMaxPool => Layer::GlobalMaxPool,
                LayerSpec::Flatten => Layer::Flatten,
                LayerSpec::Dropout { rate } => Layer::Dropout { rate: *rate },
                LayerSpec::Dense { size, activation } => {
                    Layer::Dense(Dense::new(*size, shape.len(), activation.clone(), rng))
                }
            };
            shape = layer.output_shape(shape)?;
            layers.push(layer);
        }

        let mut metadata = self.metadata.clone().unwrap_or_default();
        metadata.input_type = Some(self.input);
        if metadata.description.is_none() {
            metadata.description = Some(self.name.clone());
        }
        Ok(Network::new(layers).with_metadata(metadata))
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<NetworkSpec> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn spec() -> NetworkSpec {
        NetworkSpec {
            name: "tiny".into(),
            input: InputType::ImageRgb { width: 8, height: 6 },
            layers: vec![
                LayerSpec::Conv2d {
                    filters: 4, kernel_size: 3, stride: 1, padding: Padding::Same,
                    activation: ActivationFunction::ReLU,
                },
                LayerSpec::MaxPool2d { pool_size: 2 },
                LayerSpec::Flatten,
                LayerSpec::Dense { size: 4, activation: ActivationFunction::Softmax },
            ],
            metadata: None,
        }
    }

    #[test]
    fn test_build_infers_input_sizes() {
        let net = spec().build(&mut StdRng::seed_from_u64(0)).unwrap();
        match &net.layers[3] {
            Layer::Dense(d) => assert_eq!(d.input_size(), 3 * 4 * 4),
            other => panic!("unexpected layer {}", other.name()),
        }
        assert_eq!(net.input_type(), Some(InputType::ImageRgb { width: 8, height: 6 }));
        assert_eq!(spec().output_shape().unwrap(), Shape::vector(4));
    }

    #[test]
    fn test_dense_on_spatial_map_is_rejected() {
        let mut s = spec();
        s.layers.remove(2);
        assert!(s.output_shape().is_err());
    }

    #[test]
    fn test_stride_defaults_to_one() {
        let layer: LayerSpec = serde_json::from_str(
            r#"{"type":"conv2d","filters":2,"kernel_size":3,"padding":"valid","activation":"ReLU"}"#,
        ).unwrap();
        assert!(matches!(layer, LayerSpec::Conv2d { stride: 1, .. }));
    }
}
