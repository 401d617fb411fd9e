use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError, Uniform};

use super::{ParamGen, RandErr};

/// A parameter generator sampling from a probability distribution.
///
/// The random number generator is shared between every layer of a network so the whole
/// parameter vector is a deterministic function of a single seed.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
    remaining: usize,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    /// Creates a new `RandParamGen`.
    ///
    /// # Arguments
    /// * `rng` - The shared random number generator.
    /// * `distribution` - The distribution to sample from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(rng: Rc<RefCell<R>>, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: limit,
        }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Creates a generator over the uniform range `[low, high)`.
    ///
    /// # Errors
    /// A `RandErr` if the range is empty.
    pub fn uniform(
        rng: Rc<RefCell<R>>,
        limit: usize,
        low: f32,
        high: f32,
    ) -> Result<Self, RandErr> {
        let distribution =
            Uniform::new(low, high).map_err(|source| RandErr::Uniform { low, high, source })?;

        Ok(Self::new(rng, distribution, limit))
    }
}

impl<R: Rng> RandParamGen<R, Normal<f32>> {
    /// Creates a generator over a normal distribution.
    ///
    /// # Errors
    /// A `RandErr` if `std_dev` is negative or not finite.
    pub fn normal(
        rng: Rc<RefCell<R>>,
        limit: usize,
        mean: f32,
        std_dev: f32,
    ) -> Result<Self, RandErr> {
        let reject = |source| RandErr::Normal {
            mean,
            std_dev,
            source,
        };

        // `Normal` takes a negative deviation as a mirrored distribution.
        if std_dev < 0. {
            return Err(reject(NormalError::BadVariance));
        }

        let distribution = Normal::new(mean, std_dev).map_err(reject)?;

        Ok(Self::new(rng, distribution, limit))
    }

    /// Kaiming normal initialization for the weights of a convolution with `c_in` input
    /// channels and a square `kernel`, suited for the ReLU activations that follow it.
    ///
    /// # Errors
    /// `RandErr::EmptyFanIn` if the layer has no inputs.
    pub fn kaiming(
        rng: Rc<RefCell<R>>,
        limit: usize,
        c_in: usize,
        kernel: usize,
    ) -> Result<Self, RandErr> {
        let fan_in = c_in * kernel * kernel;
        if fan_in == 0 {
            return Err(RandErr::EmptyFanIn);
        }

        let std_dev = (2. / fan_in as f32).sqrt();
        Self::normal(rng, limit, 0., std_dev)
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        if self.remaining == 0 {
            return None;
        }

        let n = n.min(self.remaining);
        self.remaining -= n;

        let mut rng = self.rng.borrow_mut();
        let sample = (0..n).map(|_| self.distribution.sample(&mut *rng)).collect();
        Some(sample)
    }
}
