use ndarray::{Array3, Array4, ArrayView4, Axis, Zip};

use super::Mask;
use crate::error::{MlErr, Result};

/// The spread of an ensemble prediction, whose channels are the ensemble members.
///
/// Both statistics are taken per grid cell over the members, the standard deviation with
/// the unbiased estimator.
pub(super) struct MemberStats {
    members: usize,
    pub(super) mean: Array3<f32>,
    pub(super) std: Array3<f32>,
}

impl MemberStats {
    /// # Errors
    /// `MlErr::InvalidConfig` if the prediction has fewer than two members.
    pub(super) fn new(y_pred: ArrayView4<f32>) -> Result<Self> {
        let members = y_pred.len_of(Axis(1));
        if members < 2 {
            return Err(MlErr::InvalidConfig(format!(
                "an ensemble loss needs at least two predicted members, got {members}"
            )));
        }

        let mean = y_pred
            .mean_axis(Axis(1))
            .ok_or_else(|| MlErr::InvalidConfig("empty ensemble".into()))?;
        let std = y_pred.std_axis(Axis(1), 1.);

        Ok(Self { members, mean, std })
    }

    /// The amount of grid cells the statistics were taken over.
    pub(super) fn cells(&self) -> usize {
        self.mean.len()
    }

    /// Chains the gradients with respect to the mean and the standard deviation of every
    /// cell back to the members they were computed from.
    ///
    /// Cells without spread pass no gradient through their standard deviation.
    pub(super) fn backward(
        &self,
        y_pred: ArrayView4<f32>,
        d_mean: &Array3<f32>,
        d_std: &Array3<f32>,
    ) -> Array4<f32> {
        let c = self.members as f32;
        let mut grad = Array4::zeros(y_pred.raw_dim());

        for (mut gk, pk) in grad.axis_iter_mut(Axis(1)).zip(y_pred.axis_iter(Axis(1))) {
            Zip::from(&mut gk)
                .and(&pk)
                .and(&self.mean)
                .and(&self.std)
                .and(d_mean)
                .and(d_std)
                .for_each(|g, &p, &mu, &s, &dm, &ds| {
                    let spread = if s > 0. { ds * (p - mu) / ((c - 1.) * s) } else { 0. };
                    *g = dm / c + spread;
                });
        }

        grad
    }
}

/// Losses mixing the members of a cell can't be restricted to some of its positions.
pub(super) fn reject_mask(loss: &str, mask: &Mask) -> Result<()> {
    match mask {
        Mask::Unmasked => Ok(()),
        Mask::Masked(_) => Err(MlErr::InvalidConfig(format!(
            "the {loss} loss is not elementwise and can't be masked"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;

    #[test]
    fn single_member_is_rejected() {
        let y_pred = Array4::<f32>::zeros((1, 1, 2, 2));
        assert!(matches!(
            MemberStats::new(y_pred.view()),
            Err(MlErr::InvalidConfig(_))
        ));
    }

    #[test]
    fn mean_gradient_is_shared_evenly() {
        let y_pred = Array4::from_shape_fn((1, 4, 1, 1), |(_, k, _, _)| k as f32);
        let stats = MemberStats::new(y_pred.view()).unwrap();

        let d_mean = Array3::ones((1, 1, 1));
        let d_std = Array3::zeros((1, 1, 1));
        let grad = stats.backward(y_pred.view(), &d_mean, &d_std);

        assert!(grad.iter().all(|g| *g == 0.25));
    }
}
