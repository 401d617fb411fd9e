use ndarray::{Array4, ArrayView4};

use super::ElementwiseLoss;

/// Mean squared error loss function.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mse;

impl Mse {
    /// Returns a new `Mse`.
    pub fn new() -> Self {
        Self
    }
}

impl ElementwiseLoss for Mse {
    fn elementwise(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Array4<f32> {
        (&y_pred - &y).mapv_into(|x| x.powi(2))
    }

    fn elementwise_prime(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Array4<f32> {
        (&y_pred - &y) * 2.0
    }
}
