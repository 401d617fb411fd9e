use std::{
    error::Error,
    fmt::{self, Display},
};

use rand_distr::{NormalError, uniform::Error as UniformError};

/// A `RandParamGen` whose distribution could not be built.
#[derive(Debug)]
pub enum RandErr {
    Normal {
        mean: f32,
        std_dev: f32,
        source: NormalError,
    },
    Uniform {
        low: f32,
        high: f32,
        source: UniformError,
    },
    /// Kaiming initialization of a layer with no inputs.
    EmptyFanIn,
}

impl Display for RandErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RandErr::Normal {
                mean,
                std_dev,
                source,
            } => write!(f, "normal distribution N({mean}, {std_dev}): {source}"),
            RandErr::Uniform { low, high, source } => {
                write!(f, "uniform distribution over [{low}, {high}): {source}")
            }
            RandErr::EmptyFanIn => f.write_str("kaiming initialization needs a positive fan in"),
        }
    }
}

impl Error for RandErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RandErr::Normal { source, .. } => Some(source),
            RandErr::Uniform { source, .. } => Some(source),
            RandErr::EmptyFanIn => None,
        }
    }
}
