use super::Scheduler;
use crate::optimization::Optimizer;

/// Leaves the learning rate untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantLr;

impl ConstantLr {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for ConstantLr {
    fn step<O: Optimizer>(&mut self, _optimizer: &mut O) {}
}
