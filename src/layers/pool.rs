use serde::{Serialize, Deserialize};

use crate::error::{LensError, Result};
use crate::layers::LayerOutput;
use crate::math::tensor::{Shape, Tensor};

/// Windowed max pooling with valid padding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxPool2d {
    pub pool_size: usize,
    pub stride: usize,
}

impl MaxPool2d {
    pub fn new(pool_size: usize) -> MaxPool2d {
        MaxPool2d { pool_size, stride: pool_size }
    }

    pub fn output_shape(&self, input: Shape) -> Result<Shape> {
        if self.pool_size == 0 || self.stride == 0 {
            return Err(LensError::Shape("pool size and stride must be positive".into()));
        }
        if input.height < self.pool_size || input.width < self.pool_size {
            return Err(LensError::Shape(format!(
                "{} input is smaller than a {}x{} pool", input, self.pool_size, self.pool_size
            )));
        }
        Ok(Shape::new(
            (input.height - self.pool_size) / self.stride + 1,
            (input.width - self.pool_size) / self.stride + 1,
            input.channels,
        ))
    }

    /// Input coordinate of the first maximum inside the window at (oy, ox).
    fn argmax(&self, input: &Tensor, oy: usize, ox: usize, c: usize) -> (usize, usize) {
        let mut best = (oy * self.stride, ox * self.stride);
        let mut best_val = f64::NEG_INFINITY;
        for py in 0..self.pool_size {
            for px in 0..self.pool_size {
                let (iy, ix) = (oy * self.stride + py, ox * self.stride + px);
                let v = input.get(iy, ix, c);
                if v > best_val {
                    best_val = v;
                    best = (iy, ix);
                }
            }
        }
        best
    }

    pub fn forward(&self, input: &Tensor) -> Result<LayerOutput> {
        let shape = self.output_shape(input.shape)?;
        let mut out = Tensor::zeros(shape);
        for oy in 0..shape.height {
            for ox in 0..shape.width {
                for c in 0..shape.channels {
                    let (iy, ix) = self.argmax(input, oy, ox, c);
                    let idx = out.index(oy, ox, c);
                    out.data[idx] = input.get(iy, ix, c);
                }
            }
        }
        Ok(LayerOutput { pre_activation: None, output: out })
    }

    /// Routes each output gradient back to the position that won the max.
    pub fn backward(&self, input: &Tensor, grad_out: &Tensor) -> Result<Tensor> {
        let shape = self.output_shape(input.shape)?;
        let mut grad_in = Tensor::zeros(input.shape);
        for oy in 0..shape.height {
            for ox in 0..shape.width {
                for c in 0..shape.channels {
                    let (iy, ix) = self.argmax(input, oy, ox, c);
                    let idx = grad_in.index(iy, ix, c);
                    grad_in.data[idx] += grad_out.get(oy, ox, c);
                }
            }
        }
        Ok(grad_in)
    }
}

/// First position holding the maximum of channel `c` over the whole map.
fn global_argmax(input: &Tensor, c: usize) -> (usize, usize) {
    let mut best = (0, 0);
    let mut best_val = f64::NEG_INFINITY;
    for y in 0..input.shape.height {
        for x in 0..input.shape.width {
            let v = input.get(y, x, c);
            if v > best_val {
                best_val = v;
                best = (y, x);
            }
        }
    }
    best
}

/// Max over the whole spatial extent, one value per channel.
pub fn global_max_forward(input: &Tensor) -> Result<LayerOutput> {
    if input.shape.height == 0 || input.shape.width == 0 {
        return Err(LensError::Shape(format!("global max pool input {} has no pixels", input.shape)));
    }
    let data = (0..input.shape.channels)
        .map(|c| {
            let (y, x) = global_argmax(input, c);
            input.get(y, x, c)
        })
        .collect();
    Ok(LayerOutput { pre_activation: None, output: Tensor::vector(data) })
}

pub fn global_max_backward(input: &Tensor, grad_out: &Tensor) -> Result<Tensor> {
    if grad_out.len() != input.shape.channels {
        return Err(LensError::Shape(format!(
            "global max pool gradient has {} values for {} channels",
            grad_out.len(), input.shape.channels
        )));
    }
    let mut grad_in = Tensor::zeros(input.shape);
    for c in 0..input.shape.channels {
        let (y, x) = global_argmax(input, c);
        let idx = grad_in.index(y, x, c);
        grad_in.data[idx] = grad_out.data[c];
    }
    Ok(grad_in)
}
