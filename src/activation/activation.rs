use serde::{Serialize, Deserialize};
use std::f64::consts::E;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Identity,
    /// Softmax is a vector-valued activation; use `apply()` and `backprop()`
    /// which handle the whole output vector at once.
    Softmax,
    Tanh,
    LeakyReLU { alpha: f64 },
}

impl ActivationFunction {
    /// Element-wise activation. `Softmax` has no element-wise form and maps
    /// to identity here; `apply()` never routes it through this path.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
        }
    }

    /// Element-wise derivative, evaluated at the pre-activation `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            },
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => 1.0,
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
        }
    }

    pub fn is_vector_valued(&self) -> bool {
        matches!(self, ActivationFunction::Softmax)
    }

    /// Applies the activation to a whole pre-activation vector.
    pub fn apply(&self, z: &[f64]) -> Vec<f64> {
        match self {
            ActivationFunction::Softmax => softmax(z),
            _ => z.iter().map(|&x| self.function(x)).collect(),
        }
    }

    /// Maps `∂L/∂a` to `∂L/∂z` for one layer.
    ///
    /// `z` is the pre-activation vector and `a` the activation output.
    /// Softmax uses the full Jacobian-vector product
    /// `∂L/∂z_j = a_j (g_j - Σ_k g_k a_k)`.
    pub fn backprop(&self, z: &[f64], a: &[f64], grad_out: &[f64]) -> Vec<f64> {
        match self {
            ActivationFunction::Softmax => {
                let dot: f64 = grad_out.iter().zip(a).map(|(g, p)| g * p).sum();
                a.iter().zip(grad_out).map(|(p, g)| p * (g - dot)).collect()
            }
            _ => z.iter().zip(grad_out).map(|(&x, g)| self.derivative(x) * g).collect(),
        }
    }
}

/// Numerically stable softmax: shifts by the max logit before exponentiating.
pub fn softmax(z: &[f64]) -> Vec<f64> {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = z.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
