use log::debug;
use ndarray::{Array3, Array4, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::Dataset;
use crate::error::{MlErr, Result};

/// A dataset over an ensemble forecast field shaped `(time, member, height, width)`.
///
/// The members are shuffled once with a seeded generator and split in two: the first
/// `member_split` become the input channels and the rest the target channels. Every time
/// step is a sample.
#[derive(Debug, Clone)]
pub struct EnsembleDataset {
    field: Array4<f32>,
    input_members: Vec<usize>,
    target_members: Vec<usize>,
}

impl EnsembleDataset {
    /// Creates a new `EnsembleDataset`.
    ///
    /// # Arguments
    /// * `field` - The ensemble field.
    /// * `member_split` - How many members go to the input.
    /// * `seed` - The seed of the member shuffle.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` unless both sides of the split get at least one member.
    pub fn new(field: Array4<f32>, member_split: usize, seed: u64) -> Result<Self> {
        let members = field.len_of(Axis(1));

        if member_split == 0 || member_split >= members {
            return Err(MlErr::InvalidConfig(format!(
                "cannot split {members} members at {member_split}"
            )));
        }

        let mut order: Vec<usize> = (0..members).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let target_members = order.split_off(member_split);

        debug!(
            members = members,
            inputs = order.len(),
            targets = target_members.len();
            "split ensemble members"
        );

        Ok(Self {
            field,
            input_members: order,
            target_members,
        })
    }

    pub fn input_members(&self) -> &[usize] {
        &self.input_members
    }

    pub fn target_members(&self) -> &[usize] {
        &self.target_members
    }

    /// The `(height, width)` of the grid.
    pub fn grid(&self) -> (usize, usize) {
        let (_, _, h, w) = self.field.dim();
        (h, w)
    }
}

impl Dataset for EnsembleDataset {
    fn len(&self) -> usize {
        self.field.len_of(Axis(0))
    }

    fn get(&self, index: usize) -> Result<(Array3<f32>, Array3<f32>)> {
        let len = self.len();
        if index >= len {
            return Err(MlErr::OutOfBounds { index, len });
        }

        let step = self.field.index_axis(Axis(0), index);
        let x = step.select(Axis(0), &self.input_members);
        let y = step.select(Axis(0), &self.target_members);
        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> Array4<f32> {
        Array4::from_shape_fn((3, 5, 2, 2), |(t, m, ..)| (10 * t + m) as f32)
    }

    #[test]
    fn members_are_split_without_overlap() {
        let dataset = EnsembleDataset::new(field(), 2, 7).unwrap();

        let mut members = dataset.input_members().to_vec();
        members.extend(dataset.target_members());
        members.sort();

        assert_eq!(dataset.input_members().len(), 2);
        assert_eq!(members, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn samples_are_time_steps() {
        let dataset = EnsembleDataset::new(field(), 3, 0).unwrap();
        let (x, y) = dataset.get(2).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(x.dim(), (3, 2, 2));
        assert_eq!(y.dim(), (2, 2, 2));
        assert_eq!(x[[0, 0, 0]], (20 + dataset.input_members()[0]) as f32);
    }

    #[test]
    fn split_must_leave_targets() {
        assert!(EnsembleDataset::new(field(), 5, 0).is_err());
        assert!(EnsembleDataset::new(field(), 0, 0).is_err());
    }
}
