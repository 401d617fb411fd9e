use ndarray::{Array3, Array4, Axis};

use super::Dataset;
use crate::error::{MlErr, Result};

/// A dataset holding every input and target in memory, stacked along the first axis.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    inputs: Array4<f32>,
    targets: Array4<f32>,
}

impl InMemoryDataset {
    /// Creates a new `InMemoryDataset`.
    ///
    /// # Arguments
    /// * `inputs` - The inputs, shaped `(sample, channel, height, width)`.
    /// * `targets` - The targets, one per input and on the same grid.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if the amount of samples or the grids differ.
    pub fn new(inputs: Array4<f32>, targets: Array4<f32>) -> Result<Self> {
        let (n, _, h, w) = inputs.dim();
        let (tn, _, th, tw) = targets.dim();

        if n != tn {
            return Err(MlErr::SizeMismatch {
                what: "targets",
                got: tn,
                expected: n,
            });
        }

        if (h, w) != (th, tw) {
            return Err(MlErr::SizeMismatch {
                what: "target grid cells",
                got: th * tw,
                expected: h * w,
            });
        }

        Ok(Self { inputs, targets })
    }

    pub fn inputs(&self) -> &Array4<f32> {
        &self.inputs
    }

    pub fn targets(&self) -> &Array4<f32> {
        &self.targets
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.inputs.len_of(Axis(0))
    }

    fn get(&self, index: usize) -> Result<(Array3<f32>, Array3<f32>)> {
        let len = self.len();
        if index >= len {
            return Err(MlErr::OutOfBounds { index, len });
        }

        let x = self.inputs.index_axis(Axis(0), index).to_owned();
        let y = self.targets.index_axis(Axis(0), index).to_owned();
        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> InMemoryDataset {
        let inputs = Array4::from_shape_fn((4, 2, 3, 3), |(n, ..)| n as f32);
        let targets = Array4::from_shape_fn((4, 1, 3, 3), |(n, ..)| -(n as f32));
        InMemoryDataset::new(inputs, targets).unwrap()
    }

    #[test]
    fn batches_stack_samples_in_order() {
        let (x, y) = dataset().batch(&[3, 1]).unwrap();

        assert_eq!(x.dim(), (2, 2, 3, 3));
        assert_eq!(x[[0, 1, 2, 2]], 3.);
        assert_eq!(y[[1, 0, 0, 0]], -1.);
    }

    #[test]
    fn out_of_bounds_index() {
        let result = dataset().get(4);
        assert!(matches!(result, Err(MlErr::OutOfBounds { index: 4, len: 4 })));
    }

    #[test]
    fn grids_must_match() {
        let inputs = Array4::zeros((2, 1, 4, 4));
        let targets = Array4::zeros((2, 1, 4, 3));

        assert!(InMemoryDataset::new(inputs, targets).is_err());
    }
}
