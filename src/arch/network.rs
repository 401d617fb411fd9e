use super::Mode;
use crate::error::Result;

/// A network with a forward pass and the backward pass that differentiates it.
///
/// Networks don't own their parameters: every layer reads its own range of a flat parameter
/// buffer and accumulates into the same range of a gradient buffer of equal length.
pub trait Network {
    type Input;
    type Output;

    /// Returns the amount of parameters in the network.
    fn size(&self) -> usize;

    /// Makes a forward pass through the network, caching what the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - The flat parameter buffer the network was laid out in.
    /// * `x` - The input.
    fn forward(&mut self, params: &[f32], x: Self::Input) -> Result<Self::Output>;

    /// Backpropagates the gradient of the output, accumulating the parameters' gradient into
    /// `grad`.
    ///
    /// # Returns
    /// The gradient with respect to the input of the last forward pass.
    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Self::Output,
    ) -> Result<Self::Input>;

    /// Switches the network between training and evaluation behavior.
    fn set_mode(&mut self, mode: Mode);
}
