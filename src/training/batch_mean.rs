/// The mean of per batch losses, weighted by the amount of samples in every batch so a
/// smaller last batch counts for what it holds.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct BatchMean {
    total: f32,
    samples: usize,
}

impl BatchMean {
    pub(super) fn add(&mut self, loss: f32, samples: usize) {
        self.total += loss * samples as f32;
        self.samples += samples;
    }

    /// Zero before any batch.
    pub(super) fn mean(&self) -> f32 {
        if self.samples == 0 {
            return 0.;
        }

        self.total / self.samples as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smaller_last_batch_weighs_less() {
        let mut mean = BatchMean::default();
        mean.add(1., 2);
        mean.add(1., 2);
        mean.add(4., 1);

        assert!((mean.mean() - 1.6).abs() < 1e-6);
    }

    #[test]
    fn empty_mean_is_zero() {
        assert_eq!(BatchMean::default().mean(), 0.);
    }
}
