mod batch_mean;
mod config;
mod evaluator;
mod settings;
mod trainer;

pub use config::{
    EvaluationConfig, EvaluationConfigBuilder, TrainingConfig, TrainingConfigBuilder,
};
pub use settings::Settings;
