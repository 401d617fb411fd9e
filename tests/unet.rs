use ensemble_unet::{
    Result,
    arch::{BaseNet, Crop, Decoder, Encoder, LayerBuilder, Network, UNet},
};
use ndarray::Array4;
use ndarray_rand::{
    RandomExt,
    rand::{SeedableRng, rngs::StdRng},
    rand_distr::Uniform,
};

fn random_grid(n: usize, c: usize, h: usize, w: usize) -> anyhow::Result<Array4<f32>> {
    let mut rng = StdRng::seed_from_u64(3);
    Ok(Array4::random_using((n, c, h, w), Uniform::new(-1., 1.)?, &mut rng))
}

fn halves(base: &BaseNet) -> Result<(Encoder, Decoder, Vec<f32>)> {
    let mut builder = LayerBuilder::new(0);
    let encoder = Encoder::new(base, &mut builder)?;
    let decoder = Decoder::new(base, &mut builder)?;
    Ok((encoder, decoder, builder.finish()?))
}

fn crop(encoder: usize, decoder: usize) -> Crop {
    Crop {
        encoder: (encoder, encoder),
        decoder: (decoder, decoder),
    }
}

#[test]
fn even_grid_needs_no_cropping() -> anyhow::Result<()> {
    let base = BaseNet::new(3, 1, 16, 2)?;
    let (mut encoder, mut decoder, params) = halves(&base)?;

    let encoded = encoder.forward(&params, random_grid(2, 3, 32, 32)?)?;

    let skips: Vec<_> = encoded.skips.iter().map(|s| s.dim()).collect();
    assert_eq!(skips, vec![(2, 16, 32, 32), (2, 32, 16, 16)]);
    assert_eq!(encoded.bottleneck.dim(), (2, 64, 8, 8));

    let y = decoder.forward(&params, encoded)?;

    assert_eq!(y.dim(), (2, 1, 32, 32));
    assert_eq!(decoder.crops(), vec![crop(16, 16), crop(32, 32)]);
    assert!(decoder.crops().iter().all(Crop::is_trivial));
    Ok(())
}

#[test]
fn odd_grid_is_cropped_and_padded_back() -> anyhow::Result<()> {
    let mut unet = UNet::new(BaseNet::new(3, 1, 16, 2)?, 0)?;

    let y = unet.forward(random_grid(2, 3, 33, 33)?)?;

    assert_eq!(y.dim(), (2, 1, 33, 33));
    assert_eq!(unet.decoder().crops(), vec![crop(16, 16), crop(33, 32)]);
    Ok(())
}

#[test]
fn odd_pooled_grid_is_cropped_at_both_stages() -> anyhow::Result<()> {
    let mut unet = UNet::new(BaseNet::new(3, 1, 16, 2)?, 0)?;

    let y = unet.forward(random_grid(2, 3, 34, 34)?)?;

    assert_eq!(y.dim(), (2, 1, 34, 34));
    assert_eq!(unet.decoder().crops(), vec![crop(17, 16), crop(34, 32)]);
    Ok(())
}

#[test]
fn output_channels_do_not_depend_on_the_grid() -> anyhow::Result<()> {
    let mut unet = UNet::new(BaseNet::new(2, 5, 4, 3)?, 1)?;

    for (h, w) in [(8, 8), (15, 9), (21, 30)] {
        let y = unet.forward(random_grid(2, 2, h, w)?)?;
        assert_eq!(y.dim(), (2, 5, h, w));
    }

    Ok(())
}

#[test]
fn same_seed_same_network() -> anyhow::Result<()> {
    let base = BaseNet::new(3, 2, 4, 2)?;

    let a = UNet::new(base, 11)?;
    let b = UNet::new(base, 11)?;
    let c = UNet::new(base, 12)?;

    assert_eq!(a.params(), b.params());
    assert_ne!(a.params(), c.params());
    Ok(())
}

#[test]
fn backward_reaches_every_parameter_block() -> anyhow::Result<()> {
    let mut unet = UNet::new(BaseNet::new(2, 1, 4, 2)?, 5)?;
    let x = random_grid(2, 2, 12, 12)?;

    let y = unet.forward(x.clone())?;
    unet.zero_grad();
    let dx = unet.backward(y.mapv(|v| 2. * v))?;

    assert_eq!(dx.dim(), x.dim());
    assert!(unet.grad().iter().all(|g| g.is_finite()));
    assert!(unet.grad()[..10].iter().any(|g| *g != 0.));
    Ok(())
}

#[test]
fn backward_matches_finite_differences_on_an_odd_grid() -> anyhow::Result<()> {
    // 9x11 is cropped at both decoder stages and padded back at the output.
    let mut unet = UNet::new(BaseNet::new(2, 1, 4, 2)?, 9)?;
    let x = random_grid(2, 2, 9, 11)?;
    let weights = random_grid(2, 1, 9, 11)?.mapv(|w| w + 0.1);

    unet.forward(x.clone())?;
    assert!(unet.decoder().crops().iter().all(|c| !c.is_trivial()));

    unet.zero_grad();
    let dx = unet.backward(weights.clone())?;
    let grad = unet.grad().to_vec();
    let params = unet.params().to_vec();

    let eps = 1e-3;
    let mut loss = |params: &[f32], x: Array4<f32>| -> anyhow::Result<f32> {
        let y = Network::forward(&mut unet, params, x)?;
        Ok((y * &weights).sum())
    };

    let size = params.len();
    for i in [0, 7, size / 3, size / 2, 2 * size / 3, size - 2, size - 1] {
        let mut plus = params.clone();
        plus[i] += eps;
        let mut minus = params.clone();
        minus[i] -= eps;

        let numeric = (loss(&plus, x.clone())? - loss(&minus, x.clone())?) / (2. * eps);
        assert!(
            (numeric - grad[i]).abs() < 1e-2 + 5e-2 * grad[i].abs(),
            "parameter {i}: {numeric} vs {}",
            grad[i]
        );
    }

    for index in [[0, 0, 8, 10], [1, 1, 0, 0], [0, 1, 4, 5]] {
        let mut plus = x.clone();
        plus[index] += eps;
        let mut minus = x.clone();
        minus[index] -= eps;

        let numeric = (loss(&params, plus)? - loss(&params, minus)?) / (2. * eps);
        assert!(
            (numeric - dx[index]).abs() < 1e-2 + 5e-2 * dx[index].abs(),
            "input {index:?}: {numeric} vs {}",
            dx[index]
        );
    }

    Ok(())
}
