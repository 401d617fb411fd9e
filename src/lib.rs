pub mod arch;
pub mod dataset;
pub mod device;
pub mod error;
pub mod initialization;
pub mod optimization;
pub mod scheduling;
pub mod synchronization;
pub mod training;

pub use error::{MlErr, Result};
