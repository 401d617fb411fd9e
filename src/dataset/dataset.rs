use std::sync::Arc;

use ndarray::{Array3, Array4, Axis, stack};

use crate::error::{MlErr, Result};

/// An indexable collection of `(input, target)` grid pairs shaped `(channel, height, width)`.
///
/// Indices must be stable: every rank of a training group sees the same sample at the same
/// index, that is what makes the per rank shards disjoint.
pub trait Dataset: Send + Sync {
    /// The amount of samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the sample at `index`.
    ///
    /// # Errors
    /// `MlErr::OutOfBounds` if `index` is past the end of the dataset.
    fn get(&self, index: usize) -> Result<(Array3<f32>, Array3<f32>)>;

    /// Stacks the samples at `indices` into a batch of inputs and a batch of targets.
    fn batch(&self, indices: &[usize]) -> Result<(Array4<f32>, Array4<f32>)> {
        if indices.is_empty() {
            return Err(MlErr::InvalidConfig("cannot build an empty batch".into()));
        }

        let samples = indices
            .iter()
            .map(|&i| self.get(i))
            .collect::<Result<Vec<_>>>()?;

        let xs: Vec<_> = samples.iter().map(|(x, _)| x.view()).collect();
        let ys: Vec<_> = samples.iter().map(|(_, y)| y.view()).collect();

        Ok((stack(Axis(0), &xs)?, stack(Axis(0), &ys)?))
    }
}

impl<D: Dataset + ?Sized> Dataset for Arc<D> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Result<(Array3<f32>, Array3<f32>)> {
        (**self).get(index)
    }

    fn batch(&self, indices: &[usize]) -> Result<(Array4<f32>, Array4<f32>)> {
        (**self).batch(indices)
    }
}
