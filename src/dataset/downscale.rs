use ndarray::{Array4, ArrayView4, s};

use crate::error::{MlErr, Result};

/// Coarsens the two trailing (spatial) axes by `factor`, averaging each `factor x factor`
/// block. Trailing rows and columns that don't fill a block are dropped.
///
/// # Errors
/// `MlErr::InvalidConfig` if `factor` is zero or larger than the grid.
pub fn downscale(field: ArrayView4<f32>, factor: usize) -> Result<Array4<f32>> {
    let (t, m, h, w) = field.dim();

    if factor == 0 || factor > h || factor > w {
        return Err(MlErr::InvalidConfig(format!(
            "cannot coarsen a {h}x{w} grid by {factor}"
        )));
    }

    let f = factor;
    Ok(Array4::from_shape_fn((t, m, h / f, w / f), |(a, b, i, j)| {
        field
            .slice(s![a, b, i * f..(i + 1) * f, j * f..(j + 1) * f])
            .mean()
            .unwrap_or_default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_means_drop_the_remainder() {
        let field = Array4::from_shape_fn((1, 1, 5, 4), |(_, _, i, j)| (i * 4 + j) as f32);

        let coarse = downscale(field.view(), 2).unwrap();

        assert_eq!(coarse.dim(), (1, 1, 2, 2));
        assert_eq!(coarse[[0, 0, 0, 0]], 2.5);
        assert_eq!(coarse[[0, 0, 1, 1]], 12.5);
    }

    #[test]
    fn factor_one_is_the_identity() {
        let field = Array4::from_shape_fn((2, 1, 3, 3), |(t, _, i, j)| (t + i + j) as f32);
        assert_eq!(downscale(field.view(), 1).unwrap(), field);
    }

    #[test]
    fn zero_factor_is_rejected() {
        assert!(downscale(Array4::zeros((1, 1, 2, 2)).view(), 0).is_err());
    }
}
