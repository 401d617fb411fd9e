mod base_net;
mod decoder;
mod encoder;
pub mod layers;
pub mod loss;
mod network;
mod params;
mod unet;

pub use base_net::{BaseNet, LayerBuilder};
pub use decoder::{Crop, Decoder, crop};
pub use encoder::{Encoded, Encoder};
pub use layers::Mode;
pub use network::Network;
pub use params::ParamStore;
pub use unet::UNet;
