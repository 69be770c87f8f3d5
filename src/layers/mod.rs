pub mod conv;
pub mod dense;
pub mod pool;

use serde::{Serialize, Deserialize};

use crate::error::{LensError, Result};
use crate::math::tensor::{Shape, Tensor};

pub use conv::{Conv2d, Padding};
pub use dense::Dense;
pub use pool::MaxPool2d;

/// What a layer produced during a forward pass.
///
/// `pre_activation` is kept for layers with an activation so the backward
/// pass can evaluate σ'(z) at the right point.
#[derive(Debug, Clone)]
pub struct LayerOutput {
    pub pre_activation: Option<Tensor>,
    pub output: Tensor,
}

/// One stage of a sequential network. Serialized with a `"type"` tag so
/// weight files stay readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    GlobalMaxPool,
    Flatten,
    /// Identity at inference time; the rate is kept for reference only.
    Dropout { rate: f64 },
    Dense(Dense),
}

impl Layer {
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Conv2d(_) => "conv2d",
            Layer::MaxPool2d(_) => "max_pool2d",
            Layer::GlobalMaxPool => "global_max_pool",
            Layer::Flatten => "flatten",
            Layer::Dropout { .. } => "dropout",
            Layer::Dense(_) => "dense",
        }
    }

    pub fn output_shape(&self, input: Shape) -> Result<Shape> {
        match self {
            Layer::Conv2d(conv) => conv.output_shape(input),
            Layer::MaxPool2d(pool) => pool.output_shape(input),
            Layer::GlobalMaxPool => Ok(Shape::vector(input.channels)),
            Layer::Flatten => Ok(Shape::vector(input.len())),
            Layer::Dense(dense) => {
                dense.validate()?;
                if input.len() != dense.input_size() {
                    return Err(LensError::Shape(format!(
                        "dense layer expects {} inputs, previous layer yields {}",
                        dense.input_size(), input
                    )));
                }
                Ok(Shape::vector(dense.size))
            }
            Layer::Dropout { .. } => Ok(input),
        }
    }

    pub fn forward(&self, input: &Tensor) -> Result<LayerOutput> {
        match self {
            Layer::Conv2d(conv) => conv.forward(input),
            Layer::MaxPool2d(pool) => pool.forward(input),
            Layer::GlobalMaxPool => pool::global_max_forward(input),
            Layer::Flatten => Ok(LayerOutput {
                pre_activation: None,
                output: input.clone().reshape(Shape::vector(input.len()))?,
            }),
            Layer::Dropout { .. } => Ok(LayerOutput { pre_activation: None, output: input.clone() }),
            Layer::Dense(dense) => dense.forward(input),
        }
    }

    /// Maps ∂L/∂output to ∂L/∂input, given the input and what `forward`
    /// produced for it.
    pub fn backward(&self, input: &Tensor, trace: &LayerOutput, grad_out: &Tensor) -> Result<Tensor> {
        if grad_out.shape != trace.output.shape {
            return Err(LensError::Shape(format!(
                "{} gradient is {} but the layer produced {}",
                self.name(), grad_out.shape, trace.output.shape
            )));
        }
        match self {
            Layer::Conv2d(conv) => conv.backward(input, trace, grad_out),
            Layer::MaxPool2d(pool) => pool.backward(input, grad_out),
            Layer::GlobalMaxPool => pool::global_max_backward(input, grad_out),
            Layer::Flatten => grad_out.clone().reshape(input.shape),
            Layer::Dropout { .. } => Ok(grad_out.clone()),
            Layer::Dense(dense) => dense.backward(input, trace, grad_out),
        }
    }
}
