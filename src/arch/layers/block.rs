use ndarray::Array4;

use super::{BatchNorm2d, Conv2d, Mode, Relu};
use crate::error::Result;

/// A 3x3 convolution followed by batch normalization and a ReLU.
#[derive(Debug, Clone)]
pub struct ConvBlock {
    conv: Conv2d,
    norm: BatchNorm2d,
    relu: Relu,
}

impl ConvBlock {
    pub fn new(conv: Conv2d, norm: BatchNorm2d) -> Self {
        Self {
            conv,
            norm,
            relu: Relu::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.conv.size() + self.norm.size()
    }

    pub fn c_in(&self) -> usize {
        self.conv.c_in()
    }

    pub fn c_out(&self) -> usize {
        self.conv.c_out()
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.norm.set_mode(mode);
    }

    pub fn norm(&self) -> &BatchNorm2d {
        &self.norm
    }

    pub fn forward(&mut self, params: &[f32], x: Array4<f32>) -> Result<Array4<f32>> {
        let x = self.conv.forward(params, x)?;
        let x = self.norm.forward(params, x)?;
        self.relu.forward(x)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        let d = self.relu.backward(d)?;
        let d = self.norm.backward(params, grad, d)?;
        self.conv.backward(params, grad, d)
    }
}
