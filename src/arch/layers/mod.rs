mod batch_norm;
mod block;
mod conv;
mod max_pool;
mod pad;
mod relu;
mod upsample;

pub use batch_norm::BatchNorm2d;
pub use block::ConvBlock;
pub use conv::Conv2d;
pub use max_pool::MaxPool2d;
pub use pad::ReplicatePad;
pub use relu::Relu;
pub use upsample::Upsample;

use crate::error::{MlErr, Result};

/// Whether layers with batch statistics normalize with the batch at hand or with their
/// running estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Train,
    Eval,
}

/// The parameters of a layer inside the flat parameter buffer.
fn param_slice(params: &[f32], offset: usize, size: usize) -> Result<&[f32]> {
    params
        .get(offset..offset + size)
        .ok_or(MlErr::SizeMismatch {
            what: "parameters",
            got: params.len(),
            expected: offset + size,
        })
}

/// The gradient of a layer inside the flat gradient buffer.
fn grad_slice(grad: &mut [f32], offset: usize, size: usize) -> Result<&mut [f32]> {
    let len = grad.len();

    grad.get_mut(offset..offset + size)
        .ok_or(MlErr::SizeMismatch {
            what: "gradient",
            got: len,
            expected: offset + size,
        })
}
