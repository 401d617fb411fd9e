use std::{fmt, str::FromStr};

use crate::error::{MlErr, Result};

/// The compute target a run is placed on.
///
/// Only the host CPU is available, tensors live in ndarray buffers in host memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
}

impl Device {
    /// Resolves a device designator such as `"cpu"`.
    ///
    /// # Errors
    /// `MlErr::DeviceUnavailable` for any designator naming a target this build can't run on.
    pub fn parse(designator: &str) -> Result<Self> {
        match designator.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            _ => Err(MlErr::DeviceUnavailable(designator.to_string())),
        }
    }

    /// The canonical designator of this device.
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
        }
    }
}

impl FromStr for Device {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_is_case_insensitive() {
        assert_eq!(Device::parse("CPU").unwrap(), Device::Cpu);
        assert_eq!(" cpu ".parse::<Device>().unwrap(), Device::Cpu);
    }

    #[test]
    fn accelerators_are_unavailable() {
        let err = Device::parse("cuda:0").unwrap_err();
        assert!(matches!(err, MlErr::DeviceUnavailable(d) if d == "cuda:0"));
    }
}
