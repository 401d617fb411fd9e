use std::ops::Range;

use rand::{Rng, seq::SliceRandom};

/// Walks the indices of a shard in batches.
#[derive(Debug, Clone)]
pub struct DataLoader {
    order: Vec<usize>,
    batch_size: usize,
}

impl DataLoader {
    /// Creates a new `DataLoader` over the indices in `shard`, in order.
    pub fn new(shard: Range<usize>, batch_size: usize) -> Self {
        Self {
            order: shard.collect(),
            batch_size: batch_size.max(1),
        }
    }

    /// The amount of samples in the shard.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The amount of batches per pass, the last one may be smaller.
    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    /// Reorders the shard for the next pass.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
    }

    /// The batches of indices of one pass.
    pub fn batches(&self) -> impl Iterator<Item = &[usize]> {
        self.order.chunks(self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn batches_respect_the_shard() {
        let loader = DataLoader::new(4..9, 2);
        let batches: Vec<Vec<usize>> = loader.batches().map(<[usize]>::to_vec).collect();

        assert_eq!(batches, vec![vec![4, 5], vec![6, 7], vec![8]]);
        assert_eq!(loader.num_batches(), 3);
    }

    #[test]
    fn shuffling_keeps_the_shard() {
        let mut loader = DataLoader::new(10..20, 3);
        loader.shuffle(&mut StdRng::seed_from_u64(0));

        let mut seen: Vec<_> = loader.batches().flatten().copied().collect();
        seen.sort();
        assert_eq!(seen, (10..20).collect::<Vec<_>>());
    }
}
