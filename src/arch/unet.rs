use log::debug;
use ndarray::Array4;

use super::{
    BaseNet, Decoder, Encoder, LayerBuilder, Mode, Network, ParamStore, layers::ReplicatePad,
};
use crate::error::Result;

#[derive(Debug, Clone)]
struct Body {
    encoder: Encoder,
    decoder: Decoder,
    pad: ReplicatePad,
}

impl Body {
    fn forward(&mut self, params: &[f32], x: Array4<f32>) -> Result<Array4<f32>> {
        let (_, _, h, w) = x.dim();
        self.pad.set_target(h, w);

        let encoded = self.encoder.forward(params, x)?;
        let y = self.decoder.forward(params, encoded)?;
        self.pad.forward(y)
    }

    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        let d = self.pad.backward(d)?;
        let d = self.decoder.backward(params, grad, d)?;
        self.encoder.backward(params, grad, d)
    }

    fn set_mode(&mut self, mode: Mode) {
        self.encoder.set_mode(mode);
        self.decoder.set_mode(mode);
    }
}

/// An encoder and a decoder joined by skip connections, together with the flat parameter
/// buffer they are laid out in.
///
/// The output always has the spatial size of the input: when odd sizes lose rows or columns
/// to pooling, the decoder output is grown back by replicating its edges.
#[derive(Debug, Clone)]
pub struct UNet {
    base: BaseNet,
    body: Body,
    mode: Mode,
    pub(crate) store: ParamStore,
}

impl UNet {
    /// Creates a new `UNet` with freshly initialized parameters.
    ///
    /// # Arguments
    /// * `base` - The shape of the network.
    /// * `seed` - The seed of the parameter initialization, equal seeds give equal parameters.
    pub fn new(base: BaseNet, seed: u64) -> Result<Self> {
        let mut builder = LayerBuilder::new(seed);
        let encoder = Encoder::new(&base, &mut builder)?;
        let decoder = Decoder::new(&base, &mut builder)?;
        let params = builder.finish()?;

        debug!(
            channels_in = base.channels_in(),
            channels_out = base.channels_out(),
            hidden_size = base.hidden_size(),
            depth = base.depth(),
            params = params.len();
            "built unet"
        );

        Ok(Self {
            base,
            body: Body {
                encoder,
                decoder,
                pad: ReplicatePad::new(),
            },
            mode: Mode::Train,
            store: ParamStore::new(params),
        })
    }

    pub fn base(&self) -> &BaseNet {
        &self.base
    }

    pub fn encoder(&self) -> &Encoder {
        &self.body.encoder
    }

    pub fn decoder(&self) -> &Decoder {
        &self.body.decoder
    }

    pub fn params(&self) -> &[f32] {
        self.store.params()
    }

    /// Mutable access to the parameters, for callers restoring a trained state.
    pub fn params_mut(&mut self) -> &mut [f32] {
        self.store.params_mut()
    }

    pub fn grad(&self) -> &[f32] {
        self.store.grad()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Makes a forward pass with this network's own parameters.
    pub fn forward(&mut self, x: Array4<f32>) -> Result<Array4<f32>> {
        self.body.forward(&self.store.params, x)
    }

    /// Backpropagates through the last forward pass, accumulating into this network's
    /// gradient.
    pub fn backward(&mut self, d: Array4<f32>) -> Result<Array4<f32>> {
        self.body
            .backward(&self.store.params, &mut self.store.grad, d)
    }

    pub fn zero_grad(&mut self) {
        self.store.zero_grad();
    }
}

impl Network for UNet {
    type Input = Array4<f32>;
    type Output = Array4<f32>;

    fn size(&self) -> usize {
        self.store.size()
    }

    fn forward(&mut self, params: &[f32], x: Array4<f32>) -> Result<Array4<f32>> {
        self.body.forward(params, x)
    }

    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        self.body.backward(params, grad, d)
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.body.set_mode(mode);
    }
}
