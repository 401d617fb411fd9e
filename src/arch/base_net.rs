use std::{cell::RefCell, rc::Rc};

use rand::{SeedableRng, rngs::StdRng};

use super::layers::{BatchNorm2d, Conv2d, ConvBlock, MaxPool2d, Upsample};
use crate::{
    error::{MlErr, Result},
    initialization::{ChainedParamGen, ConstParamGen, ParamGen, RandParamGen},
};

/// The shape of a UNet: channels in and out, the width of the first stage and the amount of
/// downsampling stages. Stage `i` is `hidden_size * 2^i` channels wide.
///
/// `BaseNet` only describes layers, it has no forward pass of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseNet {
    channels_in: usize,
    channels_out: usize,
    hidden_size: usize,
    depth: usize,
}

impl BaseNet {
    /// Creates a new `BaseNet`.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` if any of the arguments is zero or the widest stage overflows.
    pub fn new(
        channels_in: usize,
        channels_out: usize,
        hidden_size: usize,
        depth: usize,
    ) -> Result<Self> {
        let named = [
            ("channels_in", channels_in),
            ("channels_out", channels_out),
            ("hidden_size", hidden_size),
            ("depth", depth),
        ];

        if let Some((name, _)) = named.iter().find(|(_, v)| *v == 0) {
            return Err(MlErr::InvalidConfig(format!("{name} must be positive")));
        }

        u32::try_from(depth)
            .ok()
            .and_then(|d| 2usize.checked_pow(d))
            .and_then(|scale| scale.checked_mul(hidden_size))
            .ok_or_else(|| MlErr::InvalidConfig(format!("depth {depth} is too large")))?;

        Ok(Self {
            channels_in,
            channels_out,
            hidden_size,
            depth,
        })
    }

    pub fn channels_in(&self) -> usize {
        self.channels_in
    }

    pub fn channels_out(&self) -> usize {
        self.channels_out
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The amount of channels at `stage`, where stage `depth` is the bottleneck.
    pub fn width(&self, stage: usize) -> usize {
        self.hidden_size << stage
    }

    /// The smallest spatial size that survives every pooling stage.
    pub fn min_input_size(&self) -> usize {
        1 << self.depth
    }
}

/// Lays layers out one after the other in a flat parameter buffer and queues the generators
/// for their initial values.
///
/// Convolution weights are drawn from a Kaiming normal, biases and batch norm shifts start at
/// zero and batch norm scales at one. Every random draw comes from one generator seeded once,
/// in layer order, so the initial parameters are a function of the seed.
pub struct LayerBuilder {
    offset: usize,
    rng: Rc<RefCell<StdRng>>,
    param_gens: Vec<Box<dyn ParamGen>>,
}

impl LayerBuilder {
    /// Creates a new `LayerBuilder`.
    ///
    /// # Arguments
    /// * `seed` - The seed of the random initialization.
    pub fn new(seed: u64) -> Self {
        Self {
            offset: 0,
            rng: Rc::new(RefCell::new(StdRng::seed_from_u64(seed))),
            param_gens: Vec::new(),
        }
    }

    /// The amount of parameters laid out so far.
    pub fn size(&self) -> usize {
        self.offset
    }

    pub fn conv(&mut self, c_in: usize, c_out: usize, kernel: usize) -> Result<Conv2d> {
        let conv = Conv2d::new(self.offset, c_in, c_out, kernel);
        let weights = RandParamGen::kaiming(self.rng.clone(), conv.weights_size(), c_in, kernel)?;

        self.param_gens.push(Box::new(weights));
        self.param_gens.push(Box::new(ConstParamGen::new(0., c_out)));
        self.offset += conv.size();
        Ok(conv)
    }

    pub fn batch_norm(&mut self, channels: usize) -> BatchNorm2d {
        let norm = BatchNorm2d::new(self.offset, channels);

        self.param_gens.push(Box::new(ConstParamGen::new(1., channels)));
        self.param_gens.push(Box::new(ConstParamGen::new(0., channels)));
        self.offset += norm.size();
        norm
    }

    /// A 3x3 convolution paired with its own batch normalization.
    pub fn conv_block(&mut self, c_in: usize, c_out: usize) -> Result<ConvBlock> {
        let conv = self.conv(c_in, c_out, 3)?;
        let norm = self.batch_norm(c_out);
        Ok(ConvBlock::new(conv, norm))
    }

    pub fn max_pool(&self) -> MaxPool2d {
        MaxPool2d::new()
    }

    pub fn upsample(&self) -> Upsample {
        Upsample::new()
    }

    /// Samples the initial value of every parameter laid out.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if the generators don't cover the layout exactly.
    pub fn finish(self) -> Result<Vec<f32>> {
        let size = self.offset;
        let mut param_gen = ChainedParamGen::new(self.param_gens);
        let params = param_gen.sample(size).unwrap_or_default();

        if params.len() != size || param_gen.sample(1).is_some() {
            return Err(MlErr::SizeMismatch {
                what: "initial parameters",
                got: params.len(),
                expected: size,
            });
        }

        Ok(params)
    }
}
