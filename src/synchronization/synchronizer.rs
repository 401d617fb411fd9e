use crate::error::Result;

/// A member of a data parallel training group.
///
/// A `Synchronizer` knows its rank within the group and runs the blocking collective that
/// averages gradients once per batch.
#[allow(unused)]
#[trait_variant::make(Synchronizer: Send)]
pub trait SynchronizerTemplate {
    /// This member's rank, in `0..world_size`.
    fn rank(&self) -> usize;

    /// The amount of members in the group.
    fn world_size(&self) -> usize;

    /// Should average `grad` in place across every member of the group and return the
    /// group's mean `loss`.
    ///
    /// Every member must call `step` the same amount of times: a member that stops calling it
    /// leaves the rest waiting forever.
    ///
    /// # Arguments
    /// * `grad` - This member's gradient, overwritten with the group's average.
    /// * `loss` - This member's batch loss.
    ///
    /// # Returns
    /// The mean loss of the group or an error if `grad` doesn't have the group's size.
    async fn step(&self, grad: &mut [f32], loss: f32) -> Result<f32>;
}
