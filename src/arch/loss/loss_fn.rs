use ndarray::{Array4, ArrayView4};

use super::Mask;
use crate::error::Result;

/// A loss function reducing a batch prediction to a scalar.
pub trait LossFn: Send + Sync {
    /// Should fail if this loss can't be restricted to the positions of `mask`.
    fn check_mask(&self, mask: &Mask) -> Result<()>;

    /// The loss of `y_pred` against `y`, restricted to `mask`.
    fn loss(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>, mask: &Mask) -> Result<f32>;

    /// The loss and its gradient with respect to `y_pred`.
    fn loss_and_grad(
        &self,
        y_pred: ArrayView4<f32>,
        y: ArrayView4<f32>,
        mask: &Mask,
    ) -> Result<(f32, Array4<f32>)>;
}

/// A loss computed position by position.
///
/// Reduction to a scalar is left to a `Mask`, which decides what positions take part in it.
pub trait ElementwiseLoss: Send + Sync {
    /// The loss at every position of the prediction.
    fn elementwise(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Array4<f32>;

    /// The derivative of `elementwise` with respect to the prediction, position by position.
    fn elementwise_prime(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Array4<f32>;
}

impl<E: ElementwiseLoss> LossFn for E {
    fn check_mask(&self, _mask: &Mask) -> Result<()> {
        Ok(())
    }

    fn loss(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>, mask: &Mask) -> Result<f32> {
        mask.loss(self, y_pred, y)
    }

    fn loss_and_grad(
        &self,
        y_pred: ArrayView4<f32>,
        y: ArrayView4<f32>,
        mask: &Mask,
    ) -> Result<(f32, Array4<f32>)> {
        mask.loss_and_grad(self, y_pred, y)
    }
}
