use log::trace;
use ndarray::Array4;

use super::{
    BaseNet, LayerBuilder, Mode, Network,
    layers::{ConvBlock, MaxPool2d},
};
use crate::error::{MlErr, Result};

/// The output of an `Encoder`: the deepest feature map and the feature maps of every stage
/// right before it was pooled, shallowest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub bottleneck: Array4<f32>,
    pub skips: Vec<Array4<f32>>,
}

#[derive(Debug, Clone)]
struct Stage {
    block: ConvBlock,
    pool: MaxPool2d,
}

/// The contracting half of a UNet.
///
/// Each stage applies a convolution block, keeps the result as a skip connection and halves
/// the spatial size with a max pool. A last block at the bottom widens to the bottleneck.
#[derive(Debug, Clone)]
pub struct Encoder {
    stages: Vec<Stage>,
    bottleneck: ConvBlock,
    channels_in: usize,
    min_size: usize,
    size: usize,
}

impl Encoder {
    /// Creates a new `Encoder`, laying its layers out in `builder`.
    pub fn new(base: &BaseNet, builder: &mut LayerBuilder) -> Result<Self> {
        let start = builder.size();
        let mut stages = Vec::with_capacity(base.depth());
        let mut c_in = base.channels_in();

        for i in 0..base.depth() {
            let block = builder.conv_block(c_in, base.width(i))?;
            let pool = builder.max_pool();
            c_in = block.c_out();
            stages.push(Stage { block, pool });
        }

        let bottleneck = builder.conv_block(c_in, base.width(base.depth()))?;

        Ok(Self {
            stages,
            bottleneck,
            channels_in: base.channels_in(),
            min_size: base.min_input_size(),
            size: builder.size() - start,
        })
    }

    /// The amount of skip connections this encoder yields.
    pub fn depth(&self) -> usize {
        self.stages.len()
    }

    fn check_input(&self, x: &Array4<f32>) -> Result<()> {
        let (_, c, h, w) = x.dim();

        if c != self.channels_in {
            return Err(MlErr::SizeMismatch {
                what: "input channels",
                got: c,
                expected: self.channels_in,
            });
        }

        if h < self.min_size || w < self.min_size {
            return Err(MlErr::InputTooSmall {
                got: (h, w),
                min: self.min_size,
            });
        }

        Ok(())
    }
}

impl Network for Encoder {
    type Input = Array4<f32>;
    type Output = Encoded;

    fn size(&self) -> usize {
        self.size
    }

    fn forward(&mut self, params: &[f32], x: Array4<f32>) -> Result<Encoded> {
        self.check_input(&x)?;

        let mut x = x;
        let mut skips = Vec::with_capacity(self.stages.len());

        for stage in self.stages.iter_mut() {
            x = stage.block.forward(params, x)?;
            skips.push(x.clone());
            x = stage.pool.forward(x)?;
        }

        let bottleneck = self.bottleneck.forward(params, x)?;
        trace!(
            skips = skips.len(),
            bottleneck_height = bottleneck.dim().2,
            bottleneck_width = bottleneck.dim().3;
            "encoded"
        );

        Ok(Encoded { bottleneck, skips })
    }

    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Encoded) -> Result<Array4<f32>> {
        let Encoded { bottleneck, skips } = d;

        if skips.len() != self.stages.len() {
            return Err(MlErr::SizeMismatch {
                what: "skip connection gradients",
                got: skips.len(),
                expected: self.stages.len(),
            });
        }

        let mut d = self.bottleneck.backward(params, grad, bottleneck)?;

        for (stage, d_skip) in self.stages.iter_mut().zip(skips).rev() {
            d = stage.pool.backward(d)?;

            if d.dim() != d_skip.dim() {
                return Err(MlErr::SizeMismatch {
                    what: "skip connection gradient",
                    got: d_skip.len(),
                    expected: d.len(),
                });
            }

            d += &d_skip;
            d = stage.block.backward(params, grad, d)?;
        }

        Ok(d)
    }

    fn set_mode(&mut self, mode: Mode) {
        for stage in self.stages.iter_mut() {
            stage.block.set_mode(mode);
        }

        self.bottleneck.set_mode(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_are_taken_before_pooling() {
        let base = BaseNet::new(2, 1, 4, 2).unwrap();
        let mut builder = LayerBuilder::new(0);
        let mut encoder = Encoder::new(&base, &mut builder).unwrap();
        let params = builder.finish().unwrap();

        let encoded = encoder.forward(&params, Array4::ones((1, 2, 9, 8))).unwrap();

        assert_eq!(encoded.skips[0].dim(), (1, 4, 9, 8));
        assert_eq!(encoded.skips[1].dim(), (1, 8, 4, 4));
        assert_eq!(encoded.bottleneck.dim(), (1, 16, 2, 2));
        assert_eq!(encoder.size(), params.len());
    }

    #[test]
    fn tiny_inputs_are_rejected() {
        let base = BaseNet::new(1, 1, 2, 3).unwrap();
        let mut builder = LayerBuilder::new(0);
        let mut encoder = Encoder::new(&base, &mut builder).unwrap();
        let params = builder.finish().unwrap();

        let result = encoder.forward(&params, Array4::zeros((1, 1, 7, 16)));
        assert!(matches!(result, Err(MlErr::InputTooSmall { min: 8, .. })));
    }
}
