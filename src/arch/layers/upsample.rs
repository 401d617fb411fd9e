use ndarray::prelude::*;

use crate::error::{MlErr, Result};

/// Nearest neighbour upsampling doubling both spatial dimensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Upsample;

impl Upsample {
    pub fn new() -> Self {
        Self
    }

    pub fn forward(&self, x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        Ok(Array4::from_shape_fn((n, c, 2 * h, 2 * w), |(b, ch, i, j)| {
            x[[b, ch, i / 2, j / 2]]
        }))
    }

    /// Every input cell fed a 2x2 block of the output, so its gradient is the block's sum.
    pub fn backward(&self, d: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = d.dim();
        if h % 2 != 0 || w % 2 != 0 {
            return Err(MlErr::SizeMismatch {
                what: "upsample gradient cells",
                got: h * w,
                expected: 4 * (h / 2) * (w / 2),
            });
        }

        Ok(Array4::from_shape_fn((n, c, h / 2, w / 2), |(b, ch, i, j)| {
            d.slice(s![b, ch, 2 * i..2 * i + 2, 2 * j..2 * j + 2]).sum()
        }))
    }
}
