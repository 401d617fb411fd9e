use ndarray::prelude::*;

use super::{Mode, grad_slice, param_slice};
use crate::error::{MlErr, Result};

const EPS: f32 = 1e-5;
const MOMENTUM: f32 = 0.1;

/// Per channel batch normalization with a learned scale (`gamma`) and shift (`beta`).
///
/// In `Mode::Train` the batch statistics normalize the input and update the running
/// estimates; in `Mode::Eval` the running estimates are used and left untouched. The running
/// estimates are layer buffers, they aren't part of the flat parameter buffer.
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    channels: usize,
    offset: usize,
    mode: Mode,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,

    // Forward metadata
    x_hat: Option<Array4<f32>>,
    inv_std: Array1<f32>,
    batch_stats: bool,
}

impl BatchNorm2d {
    /// Creates a new `BatchNorm2d`.
    ///
    /// # Arguments
    /// * `offset` - Where this layer's parameters begin in the flat parameter buffer.
    /// * `channels` - The amount of channels to normalize.
    pub fn new(offset: usize, channels: usize) -> Self {
        Self {
            channels,
            offset,
            mode: Mode::Train,
            running_mean: Array1::zeros(channels),
            running_var: Array1::ones(channels),
            x_hat: None,
            inv_std: Array1::zeros(channels),
            batch_stats: true,
        }
    }

    /// The amount of parameters, `gamma` for every channel followed by `beta`.
    pub fn size(&self) -> usize {
        2 * self.channels
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn running_mean(&self) -> ArrayView1<'_, f32> {
        self.running_mean.view()
    }

    pub fn running_var(&self) -> ArrayView1<'_, f32> {
        self.running_var.view()
    }

    pub fn forward(&mut self, params: &[f32], mut x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        if c != self.channels {
            return Err(MlErr::SizeMismatch {
                what: "batch norm channels",
                got: c,
                expected: self.channels,
            });
        }

        let (gamma, beta) = self.view_params(params)?;
        let m = (n * h * w) as f32;

        for (ch, mut xc) in x.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, var) = match self.mode {
                Mode::Train => {
                    let mean = xc.sum() / m;
                    let var = xc.fold(0., |acc, &v| acc + (v - mean).powi(2)) / m;
                    let unbiased = if m > 1. { var * m / (m - 1.) } else { var };

                    let (rm, rv) = (self.running_mean[ch], self.running_var[ch]);
                    self.running_mean[ch] = (1. - MOMENTUM) * rm + MOMENTUM * mean;
                    self.running_var[ch] = (1. - MOMENTUM) * rv + MOMENTUM * unbiased;
                    (mean, var)
                }
                Mode::Eval => (self.running_mean[ch], self.running_var[ch]),
            };

            let inv_std = 1. / (var + EPS).sqrt();
            self.inv_std[ch] = inv_std;
            xc.mapv_inplace(|v| (v - mean) * inv_std);
        }

        self.batch_stats = self.mode == Mode::Train;
        self.x_hat = Some(x.clone());

        for (ch, mut xc) in x.axis_iter_mut(Axis(1)).enumerate() {
            let (g, b) = (gamma[ch], beta[ch]);
            xc.mapv_inplace(|v| g * v + b);
        }

        Ok(x)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        let x_hat = self
            .x_hat
            .take()
            .ok_or(MlErr::MissingForward { layer: "batch norm" })?;

        let (n, _, h, w) = x_hat.dim();
        let m = (n * h * w) as f32;

        let (gamma, _) = self.view_params(params)?;
        let (mut dgamma, mut dbeta) = self.view_grad(grad)?;

        let channels = d.axis_iter_mut(Axis(1)).zip(x_hat.axis_iter(Axis(1)));
        for (ch, (mut dc, xc)) in channels.enumerate() {
            let db = dc.sum();
            let dg = (&dc * &xc).sum();
            dbeta[ch] += db;
            dgamma[ch] += dg;

            let scale = gamma[ch] * self.inv_std[ch];
            if self.batch_stats {
                dc.zip_mut_with(&xc, |d, &x| *d = scale / m * (m * *d - db - x * dg));
            } else {
                dc.mapv_inplace(|d| scale * d);
            }
        }

        Ok(d)
    }

    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView1<'a, f32>, ArrayView1<'a, f32>)> {
        let params = param_slice(params, self.offset, self.size())?;
        let (g_raw, b_raw) = params.split_at(self.channels);
        Ok((ArrayView1::from(g_raw), ArrayView1::from(b_raw)))
    }

    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut1<'a, f32>, ArrayViewMut1<'a, f32>)> {
        let grad = grad_slice(grad, self.offset, self.size())?;
        let (dg_raw, db_raw) = grad.split_at_mut(self.channels);
        Ok((ArrayViewMut1::from(dg_raw), ArrayViewMut1::from(db_raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn affine_identity(channels: usize) -> Vec<f32> {
        let mut params = vec![1.; channels];
        params.extend(vec![0.; channels]);
        params
    }

    #[test]
    fn train_mode_normalizes_each_channel() {
        let mut bn = BatchNorm2d::new(0, 2);
        let params = affine_identity(2);
        let x = Array4::from_shape_fn((2, 2, 2, 2), |(b, c, i, j)| {
            (b * 4 + i * 2 + j) as f32 * (c + 1) as f32
        });

        let out = bn.forward(&params, x).unwrap();

        for xc in out.axis_iter(Axis(1)) {
            assert!(xc.mean().unwrap().abs() < 1e-5);
            let var = xc.mapv(|v| v * v).mean().unwrap();
            assert!((var - 1.).abs() < 1e-3);
        }

        assert!((bn.running_mean()[0] - 0.35).abs() < 1e-5);
        assert!((bn.running_mean()[1] - 0.7).abs() < 1e-5);
    }

    #[test]
    fn eval_mode_uses_running_estimates() {
        let mut bn = BatchNorm2d::new(0, 1);
        bn.set_mode(Mode::Eval);
        let params = vec![2., 1.];

        let out = bn.forward(&params, Array4::from_elem((1, 1, 2, 2), 3.)).unwrap();

        let expected = 2. * 3. / (1. + EPS).sqrt() + 1.;
        assert!(out.iter().all(|&v| (v - expected).abs() < 1e-5));
        assert_eq!(bn.running_mean()[0], 0.);
    }

    #[test]
    fn train_backward_matches_finite_differences() {
        let mut bn = BatchNorm2d::new(0, 1);
        let params = vec![1.5, -0.5];
        let x = Array4::from_shape_vec((1, 1, 2, 3), vec![0.1, 0.9, -0.4, 0.3, 1.2, -0.8]);
        let weights = Array4::from_shape_vec((1, 1, 2, 3), vec![1., -2., 0.5, 3., 0., 1.]);
        let (x, weights) = (x.unwrap(), weights.unwrap());

        let loss = |bn: &mut BatchNorm2d, x: Array4<f32>| {
            (bn.forward(&params, x).unwrap() * &weights).sum()
        };

        let base = loss(&mut bn, x.clone());
        let mut grad = vec![0.; 2];
        let dx = bn.backward(&params, &mut grad, weights.clone()).unwrap();

        let eps = 1e-3;
        let mut shifted = x.clone();
        shifted[[0, 0, 1, 1]] += eps;
        let numeric = (loss(&mut bn, shifted) - base) / eps;

        let analytic = dx[[0, 0, 1, 1]];
        assert!((numeric - analytic).abs() < 2e-2, "{numeric} vs {analytic}");
        assert!((grad[1] - weights.sum()).abs() < 1e-5);
    }
}
