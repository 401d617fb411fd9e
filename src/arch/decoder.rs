use log::debug;
use ndarray::{concatenate, prelude::*};

use super::{
    BaseNet, Encoded, LayerBuilder, Mode, Network,
    layers::{Conv2d, ConvBlock, Upsample},
};
use crate::error::{MlErr, Result};

/// The spatial sizes reconciled by one call to `crop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub encoder: (usize, usize),
    pub decoder: (usize, usize),
}

impl Crop {
    /// Whether rows or columns were actually dropped.
    pub fn is_trivial(&self) -> bool {
        self.encoder == self.decoder
    }
}

/// Leading margin for a size difference, odd differences drop the extra cell up front.
fn leading(diff: usize) -> usize {
    diff - diff / 2
}

/// Center crops the spatial extent of `encoder_layer` down to the one of `decoder_layer`.
///
/// # Arguments
/// * `encoder_layer` - A skip connection feature map.
/// * `decoder_layer` - The decoder feature map it will be fused with.
///
/// # Returns
/// A view of `encoder_layer` with the spatial size of `decoder_layer`. For a difference `d`
/// on an axis, `d - d / 2` rows or columns are dropped before and `d / 2` after.
///
/// # Errors
/// `MlErr::SizeMismatch` if the batch or channel dimensions differ and
/// `MlErr::CropOutOfBounds` if the encoder layer is smaller on any spatial axis.
pub fn crop<'a>(
    encoder_layer: ArrayView4<'a, f32>,
    decoder_layer: ArrayView4<'_, f32>,
) -> Result<ArrayView4<'a, f32>> {
    let (n, c, h, w) = encoder_layer.dim();
    let (dn, dc, dh, dw) = decoder_layer.dim();

    if n != dn {
        return Err(MlErr::SizeMismatch {
            what: "crop batch",
            got: n,
            expected: dn,
        });
    }

    if c != dc {
        return Err(MlErr::SizeMismatch {
            what: "crop channels",
            got: c,
            expected: dc,
        });
    }

    if h < dh || w < dw {
        return Err(MlErr::CropOutOfBounds {
            encoder: (h, w),
            decoder: (dh, dw),
        });
    }

    let (top, left) = (leading(h - dh), leading(w - dw));
    Ok(encoder_layer.slice_move(s![.., .., top..top + dh, left..left + dw]))
}

/// Places the gradient of a cropped view back into a zeroed map of the encoder's size.
fn uncrop(d: ArrayView4<f32>, encoder: (usize, usize)) -> Array4<f32> {
    let (n, c, dh, dw) = d.dim();
    let (h, w) = encoder;
    let (top, left) = (leading(h - dh), leading(w - dw));

    let mut full = Array4::zeros((n, c, h, w));
    full.slice_mut(s![.., .., top..top + dh, left..left + dw]).assign(&d);
    full
}

#[derive(Debug, Clone)]
struct Stage {
    upsample: Upsample,
    up_block: ConvBlock,
    fuse: ConvBlock,
    last_crop: Option<Crop>,
}

/// The expanding half of a UNet.
///
/// Each stage, deepest first, doubles the spatial size, convolves down to the width of the
/// matching encoder stage, crops that stage's skip connection to fit and fuses both along
/// the channels. A 1x1 convolution maps the result to the output channels.
#[derive(Debug, Clone)]
pub struct Decoder {
    stages: Vec<Stage>,
    head: Conv2d,
    size: usize,
}

impl Decoder {
    /// Creates a new `Decoder`, laying its layers out in `builder`.
    pub fn new(base: &BaseNet, builder: &mut LayerBuilder) -> Result<Self> {
        let start = builder.size();
        let mut stages = Vec::with_capacity(base.depth());

        for i in (0..base.depth()).rev() {
            let width = base.width(i);
            let upsample = builder.upsample();
            let up_block = builder.conv_block(base.width(i + 1), width)?;
            let fuse = builder.conv_block(2 * width, width)?;

            stages.push(Stage {
                upsample,
                up_block,
                fuse,
                last_crop: None,
            });
        }

        let head = builder.conv(base.width(0), base.channels_out(), 1)?;

        Ok(Self {
            stages,
            head,
            size: builder.size() - start,
        })
    }

    /// The crops of the last forward pass, deepest stage first.
    pub fn crops(&self) -> Vec<Crop> {
        self.stages.iter().filter_map(|stage| stage.last_crop).collect()
    }
}

impl Network for Decoder {
    type Input = Encoded;
    type Output = Array4<f32>;

    fn size(&self) -> usize {
        self.size
    }

    fn forward(&mut self, params: &[f32], x: Encoded) -> Result<Array4<f32>> {
        let Encoded { bottleneck, skips } = x;

        if skips.len() != self.stages.len() {
            return Err(MlErr::SizeMismatch {
                what: "skip connections",
                got: skips.len(),
                expected: self.stages.len(),
            });
        }

        let mut x = bottleneck;

        for (stage, skip) in self.stages.iter_mut().zip(skips.iter().rev()) {
            stage.last_crop = None;

            let up = stage.upsample.forward(x)?;
            let up = stage.up_block.forward(params, up)?;
            let cropped = crop(skip.view(), up.view())?;

            let (_, _, h, w) = skip.dim();
            let (_, _, dh, dw) = up.dim();
            let last_crop = Crop {
                encoder: (h, w),
                decoder: (dh, dw),
            };

            if !last_crop.is_trivial() {
                debug!(
                    encoder_height = h,
                    encoder_width = w,
                    height = dh,
                    width = dw;
                    "cropped skip connection"
                );
            }

            stage.last_crop = Some(last_crop);
            let fused = concatenate(Axis(1), &[cropped, up.view()])?;
            x = stage.fuse.forward(params, fused)?;
        }

        self.head.forward(params, x)
    }

    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array4<f32>) -> Result<Encoded> {
        let mut d = self.head.backward(params, grad, d)?;
        let mut skips = Vec::with_capacity(self.stages.len());

        for stage in self.stages.iter_mut().rev() {
            let crop = stage
                .last_crop
                .ok_or(MlErr::MissingForward { layer: "decoder stage" })?;

            let d_fused = stage.fuse.backward(params, grad, d)?;
            let skip_channels = stage.fuse.c_out();
            let d_skip = d_fused.slice(s![.., ..skip_channels, .., ..]);
            let d_up = d_fused.slice(s![.., skip_channels.., .., ..]).to_owned();

            skips.push(uncrop(d_skip, crop.encoder));

            let d_up = stage.up_block.backward(params, grad, d_up)?;
            d = stage.upsample.backward(d_up)?;
        }

        Ok(Encoded {
            bottleneck: d,
            skips,
        })
    }

    fn set_mode(&mut self, mode: Mode) {
        for stage in self.stages.iter_mut() {
            stage.up_block.set_mode(mode);
            stage.fuse.set_mode(mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize, c: usize, h: usize, w: usize) -> Array4<f32> {
        Array4::from_shape_fn((n, c, h, w), |(b, ch, i, j)| {
            (((b * c + ch) * h + i) * w + j) as f32
        })
    }

    #[test]
    fn crop_of_equal_sizes_is_the_identity() {
        let a = grid(2, 3, 4, 5);
        let b = Array4::zeros((2, 3, 4, 5));

        assert_eq!(crop(a.view(), b.view()).unwrap(), a);
    }

    #[test]
    fn even_differences_are_centered() {
        let a = grid(1, 1, 6, 6);
        let b = Array4::zeros((1, 1, 2, 4));

        let cropped = crop(a.view(), b.view()).unwrap();

        assert_eq!(cropped.dim(), (1, 1, 2, 4));
        assert_eq!(cropped, a.slice(s![.., .., 2..4, 1..5]));
    }

    #[test]
    fn odd_differences_drop_the_leading_cell() {
        let a = grid(1, 1, 3, 3);
        let b = Array4::zeros((1, 1, 2, 2));

        let cropped = crop(a.view(), b.view()).unwrap();
        assert_eq!(cropped, a.slice(s![.., .., 1.., 1..]));
    }

    #[test]
    fn smaller_encoder_layer_is_out_of_bounds() {
        let a = grid(1, 1, 3, 5);
        let b = Array4::zeros((1, 1, 4, 4));

        let result = crop(a.view(), b.view());
        assert!(matches!(
            result,
            Err(MlErr::CropOutOfBounds {
                encoder: (3, 5),
                decoder: (4, 4)
            })
        ));
    }

    #[test]
    fn channel_mismatch_fails() {
        let a = grid(1, 2, 4, 4);
        let b = Array4::zeros((1, 3, 4, 4));

        assert!(matches!(
            crop(a.view(), b.view()),
            Err(MlErr::SizeMismatch { .. })
        ));
    }

    #[test]
    fn uncrop_inverts_the_crop_placement() {
        let d = Array4::ones((1, 1, 2, 2));
        let full = uncrop(d.view(), (3, 3));

        assert_eq!(full.sum(), 4.);
        assert_eq!(full[[0, 0, 0, 0]], 0.);
        assert_eq!(full[[0, 0, 2, 2]], 1.);
    }
}
