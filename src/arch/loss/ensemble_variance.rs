use ndarray::{Array3, Array4, ArrayView4};

use super::{
    LossFn, Mask,
    mask::check_target,
    members::{MemberStats, reject_mask},
};
use crate::error::Result;

/// Mean absolute error minus a reward for ensemble spread:
/// `mean(|y_pred - y|) - alpha * mean(var(y_pred))`, the variance taken per cell over the
/// predicted members (the channels).
///
/// The reward keeps an ensemble from collapsing onto its mean. Like every loss mixing the
/// members of a cell, it can't be masked.
#[derive(Debug, Clone, Copy)]
pub struct EnsembleVarianceReg {
    alpha: f32,
}

impl EnsembleVarianceReg {
    /// Creates a new `EnsembleVarianceReg`.
    ///
    /// # Arguments
    /// * `alpha` - The strength of the spread reward.
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl Default for EnsembleVarianceReg {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl LossFn for EnsembleVarianceReg {
    fn check_mask(&self, mask: &Mask) -> Result<()> {
        reject_mask("ensemble variance", mask)
    }

    fn loss(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>, mask: &Mask) -> Result<f32> {
        self.check_mask(mask)?;
        check_target(y_pred, y)?;

        let stats = MemberStats::new(y_pred)?;
        let l1 = (&y_pred - &y).mapv_into(f32::abs).sum() / y_pred.len() as f32;
        let spread = stats.std.mapv(|s| s * s).sum() / stats.cells() as f32;

        Ok(l1 - self.alpha * spread)
    }

    fn loss_and_grad(
        &self,
        y_pred: ArrayView4<f32>,
        y: ArrayView4<f32>,
        mask: &Mask,
    ) -> Result<(f32, Array4<f32>)> {
        let loss = self.loss(y_pred, y, mask)?;
        let stats = MemberStats::new(y_pred)?;

        let n = y_pred.len() as f32;
        let d_l1 = (&y_pred - &y).mapv_into(|x| if x == 0. { 0. } else { x.signum() / n });

        // d(s^2)/ds = 2s, averaged over the cells.
        let cells = stats.cells() as f32;
        let d_mean = Array3::zeros(stats.mean.raw_dim());
        let d_std = stats.std.mapv(|s| -self.alpha * 2. * s / cells);

        Ok((loss, d_l1 + stats.backward(y_pred, &d_mean, &d_std)))
    }
}
