use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use ndarray::ShapeError;

use crate::initialization::RandErr;

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The crate's error type.
#[derive(Debug)]
pub enum MlErr {
    /// Two tensors or buffers disagree on a dimension.
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A skip feature map is smaller than the decoder map it should be cropped to.
    CropOutOfBounds {
        encoder: (usize, usize),
        decoder: (usize, usize),
    },
    /// ndarray refused a reshape, concatenation or stacking.
    Shape(ShapeError),
    /// The run configuration is invalid, caught before any epoch runs.
    InvalidConfig(String),
    /// The requested compute target is not available.
    DeviceUnavailable(String),
    /// The loss became NaN or infinite.
    NonFiniteLoss {
        epoch: usize,
        batch: usize,
        loss: f32,
    },
    /// A layer was asked for a backward pass without a forward pass to differentiate.
    MissingForward { layer: &'static str },
    /// The input grid can't go through every pooling stage.
    InputTooSmall { got: (usize, usize), min: usize },
    /// A dataset index past its end.
    OutOfBounds { index: usize, len: usize },
    /// Parameter initialization failed.
    Init(RandErr),
    /// Settings could not be read or parsed.
    Settings(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(f, "size mismatch for {what}: got {got}, expected {expected}"),
            MlErr::CropOutOfBounds { encoder, decoder } => write!(
                f,
                "cannot crop a {}x{} encoder layer down to a {}x{} decoder layer",
                encoder.0, encoder.1, decoder.0, decoder.1
            ),
            MlErr::Shape(e) => write!(f, "shape error: {e}"),
            MlErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            MlErr::DeviceUnavailable(device) => write!(f, "device unavailable: {device}"),
            MlErr::NonFiniteLoss { epoch, batch, loss } => write!(
                f,
                "non finite loss {loss} at epoch {epoch}, batch {batch}, aborting the run"
            ),
            MlErr::MissingForward { layer } => {
                write!(f, "{layer} backward pass called before any forward pass")
            }
            MlErr::InputTooSmall { got, min } => write!(
                f,
                "a {}x{} input is too small, every spatial dimension must be at least {min}",
                got.0, got.1
            ),
            MlErr::OutOfBounds { index, len } => {
                write!(f, "sample index {index} is out of bounds for a dataset of {len}")
            }
            MlErr::Init(e) => write!(f, "parameter initialization failed: {e}"),
            MlErr::Settings(msg) => write!(f, "invalid settings: {msg}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            MlErr::Init(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<RandErr> for MlErr {
    fn from(value: RandErr) -> Self {
        Self::Init(value)
    }
}

impl From<serde_json::Error> for MlErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Settings(value.to_string())
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Settings(value.to_string())
    }
}
