use crate::error::{LensError, Result};
use crate::layers::LayerOutput;
use crate::math::tensor::Tensor;
use crate::network::network::Network;

/// A model whose class scores can be differentiated w.r.t. its input.
///
/// This is the only capability the saliency engine needs from a classifier.
pub trait Differentiable {
    /// Per-class scores for a single input tensor.
    fn scores(&self, input: &Tensor) -> Result<Vec<f64>>;

    /// ∂score[class_index] / ∂input, shaped like `input`.
    fn input_gradient(&self, input: &Tensor, class_index: usize) -> Result<Tensor>;
}

/// Forward-pass record over one input, kept for a single backward pass.
///
/// The tape borrows the network for as long as it lives and is consumed by
/// `backward`, so a recording can never outlive or be reused across a
/// change to the weights.
pub struct GradientTape<'n> {
    network: &'n Network,
    /// `inputs[i]` is what layer `i` received.
    inputs: Vec<Tensor>,
    traces: Vec<LayerOutput>,
    output: Tensor,
}

impl<'n> GradientTape<'n> {
    pub fn record(network: &'n Network, input: &Tensor) -> Result<GradientTape<'n>> {
        let mut inputs = Vec::with_capacity(network.layers.len());
        let mut traces = Vec::with_capacity(network.layers.len());
        let mut current = input.clone();
        for layer in &network.layers {
            let trace = layer.forward(&current)?;
            let next = trace.output.clone();
            inputs.push(current);
            traces.push(trace);
            current = next;
        }
        Ok(GradientTape { network, inputs, traces, output: current })
    }

    pub fn output(&self) -> &Tensor {
        &self.output
    }

    /// Back-propagates the scalar `output[class_index]` to the input.
    pub fn backward(self, class_index: usize) -> Result<Tensor> {
        if class_index >= self.output.len() {
            return Err(LensError::ClassIndex { index: class_index, classes: self.output.len() });
        }
        let mut grad = Tensor::zeros(self.output.shape);
        grad.data[class_index] = 1.0;

        for (i, layer) in self.network.layers.iter().enumerate().rev() {
            grad = layer.backward(&self.inputs[i], &self.traces[i], &grad)?;
        }
        Ok(grad)
    }
}

impl Differentiable for Network {
    fn scores(&self, input: &Tensor) -> Result<Vec<f64>> {
        Ok(self.forward(input)?.data)
    }

    fn input_gradient(&self, input: &Tensor, class_index: usize) -> Result<Tensor> {
        GradientTape::record(self, input)?.backward(class_index)
    }
}
