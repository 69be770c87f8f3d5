use serde::{Serialize, Deserialize};
use std::fmt;

use crate::error::{LensError, Result};
use crate::math::matrix::Matrix;

/// Spatial layout of a tensor: height × width × channels (channels last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl Shape {
    pub fn new(height: usize, width: usize, channels: usize) -> Shape {
        Shape { height, width, channels }
    }

    /// A flat feature vector, as produced by `Flatten` or a dense layer.
    pub fn vector(len: usize) -> Shape {
        Shape { height: 1, width: 1, channels: len }
    }

    pub fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// A single image (or activation map) stored channels-last.
///
/// The batch dimension is implicit: every tensor is a batch of one.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Shape,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn zeros(shape: Shape) -> Tensor {
        Tensor { shape, data: vec![0.0; shape.len()] }
    }

    pub fn from_vec(shape: Shape, data: Vec<f64>) -> Result<Tensor> {
        if data.len() != shape.len() {
            return Err(LensError::Shape(format!(
                "{} values cannot fill a {} tensor", data.len(), shape
            )));
        }
        Ok(Tensor { shape, data })
    }

    /// Wraps a flat vector as a `1×1×n` tensor.
    pub fn vector(data: Vec<f64>) -> Tensor {
        Tensor { shape: Shape::vector(data.len()), data }
    }

    #[inline]
    pub fn index(&self, y: usize, x: usize, c: usize) -> usize {
        (y * self.shape.width + x) * self.shape.channels + c
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize, c: usize) -> f64 {
        self.data[self.index(y, x, c)]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Same data, new shape. The element count must match.
    pub fn reshape(self, shape: Shape) -> Result<Tensor> {
        Tensor::from_vec(shape, self.data)
    }

    pub fn map<F>(&self, functor: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor { shape: self.shape, data: self.data.iter().map(|&x| functor(x)).collect() }
    }

    /// Collapses channels into a single-channel field by taking
    /// `max_c |t[y, x, c]|` at every pixel.
    pub fn channel_max_abs(&self) -> Matrix {
        let mut res = Matrix::zeros(self.shape.height, self.shape.width);
        for y in 0..self.shape.height {
            for x in 0..self.shape.width {
                res.data[y][x] = (0..self.shape.channels)
                    .map(|c| self.get(y, x, c).abs())
                    .fold(0.0, f64::max);
            }
        }
        res
    }
}
