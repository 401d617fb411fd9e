use ndarray::prelude::*;

use crate::error::{MlErr, Result};

/// Grows a feature map to a target spatial size by repeating its edge rows and columns.
///
/// For a difference `d` on an axis, `d - d / 2` copies go before the map and `d / 2` after
/// it, the same split used to center crops.
#[derive(Debug, Clone, Default)]
pub struct ReplicatePad {
    target: (usize, usize),
    x_dim: (usize, usize),
}

impl ReplicatePad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the spatial size the next forward pass pads to.
    pub fn set_target(&mut self, height: usize, width: usize) {
        self.target = (height, width);
    }

    pub fn forward(&mut self, x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let (th, tw) = self.target;
        self.check(h, w)?;
        self.x_dim = (h, w);

        if (h, w) == (th, tw) {
            return Ok(x);
        }

        let (top, left) = (th - h - (th - h) / 2, tw - w - (tw - w) / 2);
        Ok(Array4::from_shape_fn((n, c, th, tw), |(b, ch, i, j)| {
            let si = i.saturating_sub(top).min(h - 1);
            let sj = j.saturating_sub(left).min(w - 1);
            x[[b, ch, si, sj]]
        }))
    }

    pub fn backward(&mut self, d: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, th, tw) = d.dim();
        let (h, w) = self.x_dim;

        if (th, tw) != self.target {
            return Err(MlErr::SizeMismatch {
                what: "padding gradient cells",
                got: th * tw,
                expected: self.target.0 * self.target.1,
            });
        }

        if (h, w) == (th, tw) {
            return Ok(d);
        }

        let (top, left) = (th - h - (th - h) / 2, tw - w - (tw - w) / 2);
        let mut dx = Array4::zeros((n, c, h, w));
        for ((b, ch, i, j), &v) in d.indexed_iter() {
            let si = i.saturating_sub(top).min(h - 1);
            let sj = j.saturating_sub(left).min(w - 1);
            dx[[b, ch, si, sj]] += v;
        }

        Ok(dx)
    }

    fn check(&self, h: usize, w: usize) -> Result<()> {
        let (th, tw) = self.target;

        if h == 0 || w == 0 || h > th || w > tw {
            return Err(MlErr::CropOutOfBounds {
                encoder: (th, tw),
                decoder: (h, w),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_leading_side_first() {
        let mut pad = ReplicatePad::new();
        pad.set_target(3, 2);
        let x = Array4::from_shape_vec((1, 1, 2, 1), vec![1., 2.]).unwrap();

        let out = pad.forward(x).unwrap();

        assert_eq!(out.dim(), (1, 1, 3, 2));
        assert_eq!(out.into_raw_vec_and_offset().0, vec![1., 1., 1., 1., 2., 2.]);
    }

    #[test]
    fn edge_gradients_accumulate() {
        let mut pad = ReplicatePad::new();
        pad.set_target(3, 3);

        pad.forward(Array4::zeros((1, 1, 2, 2))).unwrap();
        let dx = pad.backward(Array4::ones((1, 1, 3, 3))).unwrap();

        assert_eq!(dx.into_raw_vec_and_offset().0, vec![4., 2., 2., 1.]);
    }

    #[test]
    fn cannot_shrink() {
        let mut pad = ReplicatePad::new();
        pad.set_target(2, 2);

        assert!(pad.forward(Array4::zeros((1, 1, 3, 2))).is_err());
    }
}
