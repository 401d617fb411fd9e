use crate::optimization::Optimizer;

/// Adjusts the learning rate of an optimizer as training advances.
pub trait Scheduler: Send {
    /// Advances the schedule by one optimizer step.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer whose learning rate is driven by this schedule.
    fn step<O: Optimizer>(&mut self, optimizer: &mut O);
}
