use std::f32::consts::FRAC_1_SQRT_2;

use ndarray::{Array4, ArrayView4, Axis, Zip};

use super::{
    LossFn, Mask,
    members::{MemberStats, reject_mask},
};
use crate::error::{MlErr, Result};

/// Keeps the predicted distribution of a cell without spread from collapsing.
const SIGMA_FLOOR: f32 = 1e-6;

/// 1 / sqrt(2 pi).
const FRAC_1_SQRT_2PI: f32 = 0.398_942_3;

/// A probabilistic score for ensemble predictions.
///
/// Every grid cell of the prediction is read as a normal distribution with the mean and
/// standard deviation of its members (the channels). Every target member is then scored by
/// how far its cumulative probability under that distribution lands from the median:
/// `mean((cdf(y) - 0.5)^2)`. A target ensemble centered on the prediction scores 0.
///
/// The target may have any amount of members, but must share batch and grid with the
/// prediction. The score mixes the members of a cell so it can't be masked.
#[derive(Debug, Default, Clone, Copy)]
pub struct Crps;

impl Crps {
    /// Returns a new `Crps`.
    pub fn new() -> Self {
        Self
    }

    /// The target members standardized by the distribution of their cell.
    fn standardize(
        &self,
        y_pred: ArrayView4<f32>,
        y: ArrayView4<f32>,
    ) -> Result<(MemberStats, Array4<f32>)> {
        check_grid(y_pred, y)?;

        let stats = MemberStats::new(y_pred)?;
        let sigma = &stats.std + SIGMA_FLOOR;

        let mut z = y.to_owned();
        for mut zk in z.axis_iter_mut(Axis(1)) {
            Zip::from(&mut zk)
                .and(&stats.mean)
                .and(&sigma)
                .for_each(|z, &mu, &sigma| *z = (*z - mu) / sigma);
        }

        Ok((stats, z))
    }
}

impl LossFn for Crps {
    fn check_mask(&self, mask: &Mask) -> Result<()> {
        reject_mask("crps", mask)
    }

    fn loss(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>, mask: &Mask) -> Result<f32> {
        self.check_mask(mask)?;

        let (_, z) = self.standardize(y_pred, y)?;
        Ok(score(&z))
    }

    fn loss_and_grad(
        &self,
        y_pred: ArrayView4<f32>,
        y: ArrayView4<f32>,
        mask: &Mask,
    ) -> Result<(f32, Array4<f32>)> {
        self.check_mask(mask)?;

        let (stats, z) = self.standardize(y_pred, y)?;
        let loss = score(&z);

        let n = z.len() as f32;
        let dz = z.mapv(|z| 2. * (normal_cdf(z) - 0.5) * normal_pdf(z) / n);

        // z = (y - mu) / sigma, so dz/dmu = -1 / sigma and dz/dsigma = -z / sigma.
        let sigma = &stats.std + SIGMA_FLOOR;
        let d_mean = -dz.sum_axis(Axis(1)) / &sigma;
        let d_std = -(&dz * &z).sum_axis(Axis(1)) / &sigma;

        Ok((loss, stats.backward(y_pred, &d_mean, &d_std)))
    }
}

fn score(z: &Array4<f32>) -> f32 {
    z.iter().map(|z| (normal_cdf(*z) - 0.5).powi(2)).sum::<f32>() / z.len() as f32
}

fn check_grid(y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Result<()> {
    let (n, _, h, w) = y_pred.dim();
    let (yn, _, yh, yw) = y.dim();

    if (n, h, w) != (yn, yh, yw) {
        return Err(MlErr::SizeMismatch {
            what: "target samples and cells",
            got: yn * yh * yw,
            expected: n * h * w,
        });
    }

    Ok(())
}

/// The standard normal cumulative distribution.
pub(super) fn normal_cdf(z: f32) -> f32 {
    0.5 * (1. + erf(z * FRAC_1_SQRT_2))
}

/// The standard normal density.
pub(super) fn normal_pdf(z: f32) -> f32 {
    FRAC_1_SQRT_2PI * (-0.5 * z * z).exp()
}

/// Abramowitz and Stegun 7.1.26, absolute error below 1.5e-7.
fn erf(x: f32) -> f32 {
    const P: f32 = 0.327_591_1;
    const A: [f32; 5] = [0.254_829_6, -0.284_496_74, 1.421_413_7, -1.453_152, 1.061_405_4];

    let t = 1. / (1. + P * x.abs());
    let poly = A.iter().rev().fold(0., |acc, a| acc * t + a) * t;
    let y = 1. - poly * (-x * x).exp();

    y.copysign(x)
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn ensemble() -> (Array4<f32>, Array4<f32>) {
        let y_pred = Array4::from_shape_fn((2, 3, 2, 2), |(b, k, i, j)| {
            (b as f32 - 0.5) + 0.3 * k as f32 * (1 + i + j) as f32
        });
        let y = Array4::from_shape_fn((2, 2, 2, 2), |(b, k, i, j)| {
            0.2 * (b + 2 * k) as f32 - 0.1 * (i * j) as f32
        });
        (y_pred, y)
    }

    #[test]
    fn cdf_is_symmetric_around_the_median() {
        assert!((normal_cdf(0.) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-4);
        assert!((normal_cdf(-1.) + normal_cdf(1.) - 1.).abs() < 1e-6);
    }

    #[test]
    fn centered_target_scores_zero() {
        let y_pred = Array4::from_shape_fn((1, 2, 1, 3), |(_, k, _, j)| j as f32 + k as f32);
        let y = y_pred.mean_axis(Axis(1)).unwrap().insert_axis(Axis(1));

        let loss = Crps.loss(y_pred.view(), y.view(), &Mask::Unmasked).unwrap();
        assert!(loss.abs() < 1e-10);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let (y_pred, y) = ensemble();
        let (_, grad) = Crps
            .loss_and_grad(y_pred.view(), y.view(), &Mask::Unmasked)
            .unwrap();

        let eps = 1e-3;
        for index in [[0, 0, 0, 0], [0, 2, 1, 1], [1, 1, 0, 1]] {
            let mut plus = y_pred.clone();
            plus[index] += eps;
            let mut minus = y_pred.clone();
            minus[index] -= eps;

            let l_plus = Crps.loss(plus.view(), y.view(), &Mask::Unmasked).unwrap();
            let l_minus = Crps.loss(minus.view(), y.view(), &Mask::Unmasked).unwrap();
            let numeric = (l_plus - l_minus) / (2. * eps);

            assert!(
                (numeric - grad[index]).abs() < 1e-3,
                "{index:?}: {numeric} vs {}",
                grad[index]
            );
        }
    }

    #[test]
    fn masks_are_rejected() {
        let (y_pred, y) = ensemble();
        let mask = Mask::new(Array2::ones((2, 2)).into_dyn()).unwrap();

        assert!(Crps.check_mask(&mask).is_err());
        assert!(matches!(
            Crps.loss(y_pred.view(), y.view(), &mask),
            Err(MlErr::InvalidConfig(_))
        ));
    }

    #[test]
    fn target_on_another_grid_fails() {
        let (y_pred, _) = ensemble();
        let y = Array4::zeros((2, 2, 3, 2));

        let result = Crps.loss(y_pred.view(), y.view(), &Mask::Unmasked);
        assert!(matches!(result, Err(MlErr::SizeMismatch { .. })));
    }
}
