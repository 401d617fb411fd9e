use ndarray::{Array4, ArrayView4};

use super::ElementwiseLoss;

/// Mean absolute error loss function.
#[derive(Debug, Default, Clone, Copy)]
pub struct L1;

impl L1 {
    /// Returns a new `L1`.
    pub fn new() -> Self {
        Self
    }
}

impl ElementwiseLoss for L1 {
    fn elementwise(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Array4<f32> {
        (&y_pred - &y).mapv_into(f32::abs)
    }

    // The subgradient at zero is taken to be zero.
    fn elementwise_prime(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Array4<f32> {
        (&y_pred - &y).mapv_into(|x| if x == 0. { 0. } else { x.signum() })
    }
}
