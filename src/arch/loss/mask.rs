use log::debug;
use ndarray::{Array4, ArrayD, ArrayView3, ArrayView4, Axis, IxDyn};

use super::ElementwiseLoss;
use crate::error::{MlErr, Result};

/// Restricts a loss to the valid positions of a grid before reducing it to a scalar.
///
/// `Masked` holds non negative weights broadcastable to a batch's output, usually zeros and
/// ones. A masked reduction is the weighted mean `sum(l * m) / sum(m)`, so an all-ones mask
/// reduces exactly like `Unmasked`.
#[derive(Debug, Clone, Default)]
pub enum Mask {
    #[default]
    Unmasked,
    Masked(ArrayD<f32>),
}

impl Mask {
    /// Creates a mask from weights.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` if a weight is negative or not finite, or if no weight is
    /// positive (nothing would be left to average).
    pub fn new(weights: ArrayD<f32>) -> Result<Self> {
        if weights.iter().any(|w| !w.is_finite() || *w < 0.) {
            return Err(MlErr::InvalidConfig(
                "mask weights must be finite and non negative".into(),
            ));
        }

        if weights.sum() <= 0. {
            return Err(MlErr::InvalidConfig("the mask has no valid position".into()));
        }

        Ok(Self::Masked(weights))
    }

    /// Creates a mask flagging the `true` positions as valid.
    pub fn from_bools(valid: ArrayD<bool>) -> Result<Self> {
        Self::new(valid.mapv(|v| if v { 1. } else { 0. }))
    }

    /// Flags as valid the cells of a `(time, height, width)` field whose variance over time is
    /// above `threshold`. Constant cells, like land or missing data filled with a constant,
    /// carry no signal to learn.
    ///
    /// The resulting mask has shape `(height, width)` and broadcasts over batch and channels.
    pub fn variance_over_time(field: ArrayView3<f32>, threshold: f32) -> Result<Self> {
        let var = field.var_axis(Axis(0), 0.).into_dyn();

        let valid = var.mapv(|v| v > threshold);
        debug!(
            valid = valid.iter().filter(|v| **v).count(),
            cells = valid.len();
            "variance mask computed"
        );

        Self::from_bools(valid)
    }

    /// Checks that this mask broadcasts to a `shape`.
    pub fn check(&self, shape: &[usize]) -> Result<()> {
        let Self::Masked(weights) = self else {
            return Ok(());
        };

        match weights.broadcast(IxDyn(shape)) {
            Some(_) => Ok(()),
            None => Err(not_broadcastable(weights.shape(), shape)),
        }
    }

    /// Computes the loss of a prediction restricted to this mask.
    ///
    /// # Errors
    /// A shape error if `y_pred` and `y` differ or the mask doesn't broadcast to them.
    pub fn loss<L: ElementwiseLoss>(
        &self,
        loss_fn: &L,
        y_pred: ArrayView4<f32>,
        y: ArrayView4<f32>,
    ) -> Result<f32> {
        check_target(y_pred, y)?;
        self.reduce(loss_fn.elementwise(y_pred, y))
    }

    /// Computes the loss restricted to this mask and its gradient with respect to `y_pred`.
    ///
    /// # Errors
    /// A shape error if `y_pred` and `y` differ or the mask doesn't broadcast to them.
    pub fn loss_and_grad<L: ElementwiseLoss>(
        &self,
        loss_fn: &L,
        y_pred: ArrayView4<f32>,
        y: ArrayView4<f32>,
    ) -> Result<(f32, Array4<f32>)> {
        check_target(y_pred, y)?;

        let loss = self.reduce(loss_fn.elementwise(y_pred, y))?;
        let grad = self.scale(loss_fn.elementwise_prime(y_pred, y))?;
        Ok((loss, grad))
    }

    fn reduce(&self, elementwise: Array4<f32>) -> Result<f32> {
        match self {
            Mask::Unmasked => Ok(elementwise.sum() / elementwise.len() as f32),
            Mask::Masked(weights) => {
                let weights = broadcast(weights, &elementwise)?;
                Ok((elementwise * &weights).sum() / weights.sum())
            }
        }
    }

    fn scale(&self, prime: Array4<f32>) -> Result<Array4<f32>> {
        match self {
            Mask::Unmasked => {
                let n = prime.len() as f32;
                Ok(prime / n)
            }
            Mask::Masked(weights) => {
                let weights = broadcast(weights, &prime)?;
                let total = weights.sum();
                Ok(prime * &weights / total)
            }
        }
    }
}

fn broadcast<'a>(weights: &'a ArrayD<f32>, to: &Array4<f32>) -> Result<ArrayView4<'a, f32>> {
    weights
        .broadcast(to.raw_dim())
        .ok_or_else(|| not_broadcastable(weights.shape(), to.shape()))
}

pub(super) fn check_target(y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Result<()> {
    if y_pred.dim() != y.dim() {
        return Err(MlErr::SizeMismatch {
            what: "target",
            got: y.len(),
            expected: y_pred.len(),
        });
    }

    Ok(())
}

fn not_broadcastable(mask: &[usize], shape: &[usize]) -> MlErr {
    MlErr::InvalidConfig(format!(
        "a mask of shape {mask:?} does not broadcast to {shape:?}"
    ))
}
