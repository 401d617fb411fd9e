use std::ops::Range;

use crate::error::{MlErr, Result};

/// Splits `total` samples among `world_size` ranks and returns the shard of `rank`.
///
/// Ranges are contiguous, disjoint and all of the same length `total / world_size`: the
/// trailing `total % world_size` samples are left out so every rank runs the same amount of
/// batches between synchronizations.
pub fn shard_range(total: usize, rank: usize, world_size: usize) -> Result<Range<usize>> {
    if world_size == 0 {
        return Err(MlErr::InvalidConfig("world size must be positive".into()));
    }

    if rank >= world_size {
        return Err(MlErr::InvalidConfig(format!(
            "rank {rank} is out of range for a world of {world_size}"
        )));
    }

    let len = total / world_size;
    Ok(rank * len..(rank + 1) * len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shards_are_equal_sized() {
        // total 10, ranks 3 => 3 samples each, the last one is dropped
        assert_eq!(shard_range(10, 0, 3).unwrap(), 0..3);
        assert_eq!(shard_range(10, 1, 3).unwrap(), 3..6);
        assert_eq!(shard_range(10, 2, 3).unwrap(), 6..9);
    }

    #[test]
    fn single_rank_takes_everything() {
        assert_eq!(shard_range(7, 0, 1).unwrap(), 0..7);
    }

    #[test]
    fn invalid_ranks() {
        assert!(shard_range(10, 3, 3).is_err());
        assert!(shard_range(10, 0, 0).is_err());
    }
}
