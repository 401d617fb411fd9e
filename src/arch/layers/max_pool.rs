use ndarray::prelude::*;

use crate::error::{MlErr, Result};

/// A 2x2 max pooling with stride 2.
///
/// Odd spatial dimensions are floored, the last row or column is never looked at.
#[derive(Debug, Clone, Default)]
pub struct MaxPool2d {
    // Forward metadata
    argmax: Option<Array4<u8>>,
    x_dim: (usize, usize, usize, usize),
}

impl MaxPool2d {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let out_dim = (n, c, h / 2, w / 2);

        let mut argmax = Array4::zeros(out_dim);
        let out = Array4::from_shape_fn(out_dim, |(b, ch, i, j)| {
            let window = x.slice(s![b, ch, 2 * i..2 * i + 2, 2 * j..2 * j + 2]);
            let (k, max) = window.iter().enumerate().fold(
                (0, f32::NEG_INFINITY),
                |best, (k, &v)| if v > best.1 { (k, v) } else { best },
            );

            argmax[[b, ch, i, j]] = k as u8;
            max
        });

        self.argmax = Some(argmax);
        self.x_dim = (n, c, h, w);
        Ok(out)
    }

    pub fn backward(&mut self, d: Array4<f32>) -> Result<Array4<f32>> {
        let argmax = self
            .argmax
            .take()
            .ok_or(MlErr::MissingForward { layer: "max pool" })?;

        if d.dim() != argmax.dim() {
            return Err(MlErr::SizeMismatch {
                what: "max pool gradient",
                got: d.len(),
                expected: argmax.len(),
            });
        }

        let mut dx = Array4::zeros(self.x_dim);
        for ((b, ch, i, j), &k) in argmax.indexed_iter() {
            let (di, dj) = (k as usize / 2, k as usize % 2);
            dx[[b, ch, 2 * i + di, 2 * j + dj]] = d[[b, ch, i, j]];
        }

        Ok(dx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_sizes_are_floored() {
        let mut pool = MaxPool2d::new();
        let x = Array4::from_shape_fn((1, 1, 5, 5), |(_, _, i, j)| (i * 5 + j) as f32);

        let out = pool.forward(x).unwrap();

        assert_eq!(out.dim(), (1, 1, 2, 2));
        assert_eq!(out.into_raw_vec_and_offset().0, vec![6., 8., 16., 18.]);
    }

    #[test]
    fn gradient_flows_to_the_maximum_only() {
        let mut pool = MaxPool2d::new();
        let x = Array4::from_shape_vec((1, 1, 2, 2), vec![0., 3., 1., 2.]).unwrap();

        pool.forward(x).unwrap();
        let dx = pool.backward(Array4::from_elem((1, 1, 1, 1), 5.)).unwrap();

        assert_eq!(dx.into_raw_vec_and_offset().0, vec![0., 5., 0., 0.]);
    }
}
