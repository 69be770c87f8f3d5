use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{LensError, Result};
use crate::layers::LayerOutput;
use crate::math::matrix::Matrix;
use crate::math::tensor::{Shape, Tensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    /// No padding; the kernel only visits fully covered positions.
    Valid,
    /// Zero padding so that `out = ceil(in / stride)`. Any odd padding
    /// pixel goes to the bottom/right edge.
    Same,
}

/// Output size and leading padding for one conv application.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    out_h: usize,
    out_w: usize,
    pad_top: usize,
    pad_left: usize,
}

/// 2D convolution over a channels-last tensor with a fused activation.
///
/// Kernels are stored flat as `[filter][ky][kx][in_channel]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    pub filters: usize,
    pub kernel_size: usize,
    pub in_channels: usize,
    pub stride: usize,
    pub padding: Padding,
    pub kernels: Vec<f64>,
    pub biases: Vec<f64>,
    pub activator: ActivationFunction,
}

impl Conv2d {
    pub fn new<R: Rng + ?Sized>(
        filters: usize,
        kernel_size: usize,
        in_channels: usize,
        stride: usize,
        padding: Padding,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Conv2d {
        let fan_in = kernel_size * kernel_size * in_channels;
        let kernels = Matrix::he(1, filters * fan_in, fan_in, rng);
        Conv2d {
            filters,
            kernel_size,
            in_channels,
            stride,
            padding,
            kernels: kernels.values().collect(),
            biases: vec![0.0; filters],
            activator: activation,
        }
    }

    #[inline]
    fn kernel_index(&self, f: usize, ky: usize, kx: usize, c: usize) -> usize {
        ((f * self.kernel_size + ky) * self.kernel_size + kx) * self.in_channels + c
    }

    fn geometry(&self, input: Shape) -> Result<Geometry> {
        if input.channels != self.in_channels {
            return Err(LensError::Shape(format!(
                "conv expects {} input channels, got {}", self.in_channels, input.channels
            )));
        }
        if input.height == 0 || input.width == 0 {
            return Err(LensError::Shape(format!("conv input {} has no pixels", input)));
        }
        if self.stride == 0 || self.kernel_size == 0 {
            return Err(LensError::Shape("conv stride and kernel size must be positive".into()));
        }
        if self.kernels.len() != self.filters * self.kernel_size * self.kernel_size * self.in_channels
            || self.biases.len() != self.filters
        {
            return Err(LensError::Shape("conv weight count does not match its declared shape".into()));
        }
        if self.activator.is_vector_valued() {
            return Err(LensError::Shape("softmax is not supported on conv layers".into()));
        }

        let k = self.kernel_size;
        let s = self.stride;
        match self.padding {
            Padding::Valid => {
                if input.height < k || input.width < k {
                    return Err(LensError::Shape(format!(
                        "{} input is smaller than a {}x{} kernel", input, k, k
                    )));
                }
                Ok(Geometry {
                    out_h: (input.height - k) / s + 1,
                    out_w: (input.width - k) / s + 1,
                    pad_top: 0,
                    pad_left: 0,
                })
            }
            Padding::Same => {
                let out_h = input.height.div_ceil(s);
                let out_w = input.width.div_ceil(s);
                let pad_h = ((out_h - 1) * s + k).saturating_sub(input.height);
                let pad_w = ((out_w - 1) * s + k).saturating_sub(input.width);
                Ok(Geometry { out_h, out_w, pad_top: pad_h / 2, pad_left: pad_w / 2 })
            }
        }
    }

    pub fn output_shape(&self, input: Shape) -> Result<Shape> {
        let g = self.geometry(input)?;
        Ok(Shape::new(g.out_h, g.out_w, self.filters))
    }

    /// Maps output position + kernel offset to an input coordinate, or `None`
    /// when it falls in the zero padding.
    #[inline]
    fn source(o: usize, k: usize, stride: usize, pad: usize, limit: usize) -> Option<usize> {
        (o * stride + k).checked_sub(pad).filter(|&i| i < limit)
    }

    pub fn forward(&self, input: &Tensor) -> Result<LayerOutput> {
        let g = self.geometry(input.shape)?;
        let out_shape = Shape::new(g.out_h, g.out_w, self.filters);
        let mut z = Tensor::zeros(out_shape);

        for oy in 0..g.out_h {
            for ox in 0..g.out_w {
                for f in 0..self.filters {
                    let mut sum = self.biases[f];
                    for ky in 0..self.kernel_size {
                        let Some(iy) = Self::source(oy, ky, self.stride, g.pad_top, input.shape.height) else { continue };
                        for kx in 0..self.kernel_size {
                            let Some(ix) = Self::source(ox, kx, self.stride, g.pad_left, input.shape.width) else { continue };
                            let base = input.index(iy, ix, 0);
                            let kbase = self.kernel_index(f, ky, kx, 0);
                            for c in 0..self.in_channels {
                                sum += input.data[base + c] * self.kernels[kbase + c];
                            }
                        }
                    }
                    let idx = z.index(oy, ox, f);
                    z.data[idx] = sum;
                }
            }
        }

        let output = z.map(|x| self.activator.function(x));
        Ok(LayerOutput { pre_activation: Some(z), output })
    }

    pub fn backward(&self, input: &Tensor, trace: &LayerOutput, grad_out: &Tensor) -> Result<Tensor> {
        let g = self.geometry(input.shape)?;
        let z = trace.pre_activation.as_ref().ok_or_else(|| {
            LensError::Shape("conv trace is missing its pre-activation".into())
        })?;
        let delta: Vec<f64> = z.data.iter().zip(&grad_out.data)
            .map(|(&x, g)| self.activator.derivative(x) * g)
            .collect();

        let mut grad_in = Tensor::zeros(input.shape);
        for oy in 0..g.out_h {
            for ox in 0..g.out_w {
                for f in 0..self.filters {
                    let d = delta[z.index(oy, ox, f)];
                    if d == 0.0 {
                        continue;
                    }
                    for ky in 0..self.kernel_size {
                        let Some(iy) = Self::source(oy, ky, self.stride, g.pad_top, input.shape.height) else { continue };
                        for kx in 0..self.kernel_size {
                            let Some(ix) = Self::source(ox, kx, self.stride, g.pad_left, input.shape.width) else { continue };
                            let base = grad_in.index(iy, ix, 0);
                            let kbase = self.kernel_index(f, ky, kx, 0);
                            for c in 0..self.in_channels {
                                grad_in.data[base + c] += d * self.kernels[kbase + c];
                            }
                        }
                    }
                }
            }
        }
        Ok(grad_in)
    }
}
