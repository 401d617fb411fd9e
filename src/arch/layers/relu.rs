use ndarray::{Zip, prelude::*};

use crate::error::{MlErr, Result};

#[derive(Debug, Clone, Default)]
pub struct Relu {
    active: Option<Array4<bool>>,
}

impl Relu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, mut x: Array4<f32>) -> Result<Array4<f32>> {
        self.active = Some(x.mapv(|v| v > 0.));
        x.mapv_inplace(|v| v.max(0.));
        Ok(x)
    }

    pub fn backward(&mut self, mut d: Array4<f32>) -> Result<Array4<f32>> {
        let active = self
            .active
            .take()
            .ok_or(MlErr::MissingForward { layer: "relu" })?;

        if d.dim() != active.dim() {
            return Err(MlErr::SizeMismatch {
                what: "relu gradient",
                got: d.len(),
                expected: active.len(),
            });
        }

        Zip::from(&mut d).and(&active).for_each(|d, &a| {
            if !a {
                *d = 0.;
            }
        });

        Ok(d)
    }
}
