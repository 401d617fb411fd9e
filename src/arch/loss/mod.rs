mod crps;
mod ensemble_variance;
mod l1;
mod loss_fn;
mod mask;
mod members;
mod mse;

pub use crps::Crps;
pub use ensemble_variance::EnsembleVarianceReg;
pub use l1::L1;
pub use loss_fn::{ElementwiseLoss, LossFn};
pub use mask::Mask;
pub use mse::Mse;
