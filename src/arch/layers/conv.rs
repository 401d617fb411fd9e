use ndarray::{linalg, prelude::*};

use super::{grad_slice, param_slice};
use crate::error::{MlErr, Result};

/// A stride 1 two dimensional convolution with zero padding.
///
/// The convolution is computed as a single matrix product over the unrolled input patches
/// (im2col), the patch matrix of the last forward pass is kept for the backward pass.
#[derive(Debug, Clone)]
pub struct Conv2d {
    c_in: usize,
    c_out: usize,
    kernel: usize,
    padding: usize,
    offset: usize,

    // Forward metadata
    cols: Option<Array2<f32>>,
    x_dim: (usize, usize, usize, usize),
}

impl Conv2d {
    /// Creates a new `Conv2d` whose output keeps the spatial size of its input.
    ///
    /// # Arguments
    /// * `offset` - Where this layer's parameters begin in the flat parameter buffer.
    /// * `c_in` - The amount of input channels.
    /// * `c_out` - The amount of output channels.
    /// * `kernel` - The side of the square, odd sized kernel.
    pub fn new(offset: usize, c_in: usize, c_out: usize, kernel: usize) -> Self {
        Self {
            c_in,
            c_out,
            kernel,
            padding: kernel / 2,
            offset,
            cols: None,
            x_dim: (0, 0, 0, 0),
        }
    }

    /// The amount of parameters this layer has, weights first and then biases.
    pub fn size(&self) -> usize {
        self.weights_size() + self.c_out
    }

    /// The amount of weights, needed to initialize them apart from the biases.
    pub fn weights_size(&self) -> usize {
        self.c_out * self.c_in * self.kernel * self.kernel
    }

    pub fn c_in(&self) -> usize {
        self.c_in
    }

    pub fn c_out(&self) -> usize {
        self.c_out
    }

    pub fn kernel(&self) -> usize {
        self.kernel
    }

    pub fn forward(&mut self, params: &[f32], x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        if c != self.c_in {
            return Err(MlErr::SizeMismatch {
                what: "convolution input channels",
                got: c,
                expected: self.c_in,
            });
        }

        let (h_out, w_out) = self.out_dim(h, w);
        let cols = self.im2col(&x, h_out, w_out)?;
        let (weights, biases) = self.view_params(params)?;

        let mut z = weights.dot(&cols);
        z += &biases.insert_axis(Axis(1));

        let out = z
            .into_shape_with_order((self.c_out, n, h_out, w_out))?
            .permuted_axes([1, 0, 2, 3])
            .as_standard_layout()
            .into_owned();

        self.cols = Some(cols);
        self.x_dim = (n, c, h, w);
        Ok(out)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        let cols = self
            .cols
            .take()
            .ok_or(MlErr::MissingForward { layer: "convolution" })?;

        let (n, _, h, w) = self.x_dim;
        let (h_out, w_out) = self.out_dim(h, w);

        let d = d
            .permuted_axes([1, 0, 2, 3])
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((self.c_out, n * h_out * w_out))?;

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &d, &cols.t(), 1.0, &mut dw);
        db += &d.sum_axis(Axis(1));

        let (weights, _) = self.view_params(params)?;
        let dcols = weights.t().dot(&d);
        self.col2im(&dcols, h_out, w_out)
    }

    fn out_dim(&self, h: usize, w: usize) -> (usize, usize) {
        let grow = 2 * self.padding + 1;
        (h + grow - self.kernel, w + grow - self.kernel)
    }

    /// Unrolls every kernel sized patch of the zero padded input into a column.
    ///
    /// Row `(c, ki, kj)` of the result holds the input channel `c` shifted by `(ki, kj)` for
    /// every batch element and output position.
    fn im2col(&self, x: &Array4<f32>, h_out: usize, w_out: usize) -> Result<Array2<f32>> {
        let (n, c, h, w) = x.dim();
        let (k, p) = (self.kernel, self.padding);

        let mut padded = Array4::zeros((n, c, h + 2 * p, w + 2 * p));
        padded.slice_mut(s![.., .., p..p + h, p..p + w]).assign(x);

        let mut cols = Array2::zeros((c * k * k, n * h_out * w_out));
        for (r, row) in cols.outer_iter_mut().enumerate() {
            let (ch, ki, kj) = (r / (k * k), (r / k) % k, r % k);
            let mut row = row.into_shape_with_order((n, h_out, w_out))?;
            row.assign(&padded.slice(s![.., ch, ki..ki + h_out, kj..kj + w_out]));
        }

        Ok(cols)
    }

    /// Folds the patch gradients back onto the input they were unrolled from.
    fn col2im(&self, dcols: &Array2<f32>, h_out: usize, w_out: usize) -> Result<Array4<f32>> {
        let (n, c, h, w) = self.x_dim;
        let (k, p) = (self.kernel, self.padding);

        let mut dpadded = Array4::zeros((n, c, h + 2 * p, w + 2 * p));
        for (r, row) in dcols.outer_iter().enumerate() {
            let (ch, ki, kj) = (r / (k * k), (r / k) % k, r % k);
            let row = row.into_shape_with_order((n, h_out, w_out))?;
            let mut window = dpadded.slice_mut(s![.., ch, ki..ki + h_out, kj..kj + w_out]);
            window += &row;
        }

        Ok(dpadded.slice(s![.., .., p..p + h, p..p + w]).to_owned())
    }

    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        let params = param_slice(params, self.offset, self.size())?;
        let (w_raw, b_raw) = params.split_at(self.weights_size());

        let weights = ArrayView2::from_shape(self.weights_dim(), w_raw)?;
        let biases = ArrayView1::from_shape(self.c_out, b_raw)?;
        Ok((weights, biases))
    }

    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        let grad = grad_slice(grad, self.offset, self.size())?;
        let (dw_raw, db_raw) = grad.split_at_mut(self.weights_size());

        let dw = ArrayViewMut2::from_shape(self.weights_dim(), dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.c_out, db_raw)?;
        Ok((dw, db))
    }

    fn weights_dim(&self) -> (usize, usize) {
        (self.c_out, self.c_in * self.kernel * self.kernel)
    }
}
