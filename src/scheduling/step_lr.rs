use log::debug;

use super::Scheduler;
use crate::{
    error::{MlErr, Result},
    optimization::Optimizer,
};

/// Decays the learning rate by `gamma` every `step_size` steps.
#[derive(Debug, Clone)]
pub struct StepLr {
    step_size: usize,
    gamma: f32,
    steps: usize,
}

impl StepLr {
    /// Creates a new `StepLr` scheduler.
    ///
    /// # Arguments
    /// * `step_size` - The amount of steps between decays.
    /// * `gamma` - The multiplicative decay factor.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` if `step_size` is zero or `gamma` is not a finite positive number.
    pub fn new(step_size: usize, gamma: f32) -> Result<Self> {
        if step_size == 0 {
            return Err(MlErr::InvalidConfig("step_size must be positive".into()));
        }

        if !gamma.is_finite() || gamma <= 0. {
            return Err(MlErr::InvalidConfig(format!(
                "gamma must be finite and positive, got {gamma}"
            )));
        }

        Ok(Self {
            step_size,
            gamma,
            steps: 0,
        })
    }
}

impl Scheduler for StepLr {
    fn step<O: Optimizer>(&mut self, optimizer: &mut O) {
        self.steps += 1;

        if self.steps % self.step_size == 0 {
            let lr = optimizer.learning_rate() * self.gamma;
            optimizer.set_learning_rate(lr);
            debug!(steps = self.steps, learning_rate = lr; "learning rate decayed");
        }
    }
}
