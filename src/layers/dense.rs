use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, math::tensor::Tensor, activation::activation::ActivationFunction};
use crate::error::{LensError, Result};
use crate::layers::LayerOutput;

/// Fully connected layer: `a = σ(x·W + b)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense{
    pub size: usize,
    /// Shape `(input_size, size)`.
    pub weights: Matrix,
    /// Shape `(1, size)`.
    pub biases: Matrix,
    pub activator: ActivationFunction
}

impl Dense {
    /// Creates a layer with He weights for ReLU-family activations and
    /// Xavier weights otherwise. Biases start at zero.
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Dense {
        let weights = match activation {
            ActivationFunction::ReLU | ActivationFunction::LeakyReLU { .. } => {
                Matrix::he(input_size, size, input_size, rng)
            }
            _ => Matrix::xavier(input_size, size, input_size, rng),
        };

        Dense {
            size,
            weights,
            biases: Matrix::zeros(1, size),
            activator: activation
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    /// Checks that the stored weights agree with `size` and with their own
    /// declared dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.weights.cols != self.size {
            return Err(LensError::Model(format!(
                "dense layer of size {} has {} weight columns", self.size, self.weights.cols
            )));
        }
        if self.biases.rows != 1 || self.biases.cols != self.size {
            return Err(LensError::Model(format!(
                "dense layer of size {} has {}x{} biases, expected 1x{}",
                self.size, self.biases.rows, self.biases.cols, self.size
            )));
        }
        for (name, m) in [("weights", &self.weights), ("biases", &self.biases)] {
            if m.data.len() != m.rows || m.data.iter().any(|row| row.len() != m.cols) {
                return Err(LensError::Model(format!(
                    "dense {} data does not match the declared {}x{}", name, m.rows, m.cols
                )));
            }
        }
        Ok(())
    }

    pub fn forward(&self, input: &Tensor) -> Result<LayerOutput> {
        self.validate()?;
        if input.len() != self.input_size() {
            return Err(LensError::Shape(format!(
                "dense layer expects {} inputs, got {} ({})",
                self.input_size(), input.len(), input.shape
            )));
        }
        let z = &Matrix::from_data(vec![input.data.clone()]) * &self.weights + self.biases.clone();
        let z = z.data.into_iter().next().unwrap_or_default();
        let a = self.activator.apply(&z);
        Ok(LayerOutput {
            pre_activation: Some(Tensor::vector(z)),
            output: Tensor::vector(a),
        })
    }

    /// Gradient of the loss w.r.t. this layer's input.
    ///
    /// `grad_out` is ∂L/∂a for this layer (error in activation space).
    pub fn backward(&self, input: &Tensor, trace: &LayerOutput, grad_out: &Tensor) -> Result<Tensor> {
        self.validate()?;
        if grad_out.len() != self.size {
            return Err(LensError::Shape(format!(
                "dense layer of size {} got a gradient of length {}", self.size, grad_out.len()
            )));
        }
        let z = trace.pre_activation.as_ref().ok_or_else(|| {
            LensError::Shape("dense trace is missing its pre-activation".into())
        })?;
        // δ = ∂L/∂z, through the activation (full Jacobian for softmax).
        let delta = self.activator.backprop(&z.data, &trace.output.data, &grad_out.data);
        let grad_in = &Matrix::from_data(vec![delta]) * &self.weights.transpose();
        Tensor::from_vec(input.shape, grad_in.data.into_iter().next().unwrap_or_default())
    }
}
