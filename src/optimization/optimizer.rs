use crate::error::{MlErr, Result};

/// Defines the strategy for updating model parameters based on calculated gradients.
///
/// An optimizer is bound to one parameter set: its `size` must equal the size of the model
/// it trains, which the training loop checks before the first epoch.
pub trait Optimizer: Send {
    /// Updates the provided slice of parameters using the gradient.
    ///
    /// # Arguments
    /// * `grad` - The model's gradient.
    /// * `params` - The parameters to update.
    ///
    /// # Returns
    /// An error if the sizes of `grad`, `params` and this optimizer disagree.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;

    /// The amount of parameters this optimizer was built for.
    fn size(&self) -> usize;

    /// The current learning rate.
    fn learning_rate(&self) -> f32;

    /// Overrides the learning rate, used by schedulers.
    fn set_learning_rate(&mut self, learning_rate: f32);
}

/// Checks that a gradient and a parameter slice both match the optimizer's size.
pub(super) fn check_sizes(size: usize, grad: &[f32], params: &[f32]) -> Result<()> {
    if grad.len() != size {
        return Err(MlErr::SizeMismatch {
            what: "gradient",
            got: grad.len(),
            expected: size,
        });
    }

    if params.len() != size {
        return Err(MlErr::SizeMismatch {
            what: "parameters",
            got: params.len(),
            expected: size,
        });
    }

    Ok(())
}
