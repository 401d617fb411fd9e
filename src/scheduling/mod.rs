mod constant;
mod scheduler;
mod step_lr;

pub use constant::ConstantLr;
pub use scheduler::Scheduler;
pub use step_lr::StepLr;
