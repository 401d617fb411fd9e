use std::num::NonZeroUsize;

use super::Settings;
use crate::{
    arch::loss::{LossFn, Mask},
    dataset::Dataset,
    device::Device,
    error::{MlErr, Result},
    optimization::Optimizer,
    scheduling::Scheduler,
};

/// Everything a training run needs, validated once at construction.
pub struct TrainingConfig<D, O, S, L> {
    pub(super) dataset: D,
    pub(super) optimizer: O,
    pub(super) scheduler: S,
    pub(super) loss_fn: L,
    pub(super) batch_size: NonZeroUsize,
    pub(super) mask: Mask,
    pub(super) epochs: NonZeroUsize,
    pub(super) device: Device,
    pub(super) seed: u64,
}

impl<D, O, S, L> TrainingConfig<D, O, S, L>
where
    D: Dataset,
    O: Optimizer,
    S: Scheduler,
    L: LossFn,
{
    /// Starts building a `TrainingConfig` around its collaborators.
    ///
    /// Defaults: a batch size of 1, a single epoch, no mask, the cpu and seed 0.
    pub fn builder(
        dataset: D,
        optimizer: O,
        scheduler: S,
        loss_fn: L,
    ) -> TrainingConfigBuilder<D, O, S, L> {
        TrainingConfigBuilder {
            dataset,
            optimizer,
            scheduler,
            loss_fn,
            batch_size: 1,
            mask: Mask::Unmasked,
            epochs: 1,
            device: Device::Cpu.as_str().to_string(),
            seed: 0,
        }
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    pub fn epochs(&self) -> usize {
        self.epochs.get()
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Builds `TrainingConfig`s, nothing is checked until `build`.
pub struct TrainingConfigBuilder<D, O, S, L> {
    dataset: D,
    optimizer: O,
    scheduler: S,
    loss_fn: L,
    batch_size: usize,
    mask: Mask,
    epochs: usize,
    device: String,
    seed: u64,
}

impl<D, O, S, L> TrainingConfigBuilder<D, O, S, L>
where
    D: Dataset,
    O: Optimizer,
    S: Scheduler,
    L: LossFn,
{
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn mask(mut self, mask: Mask) -> Self {
        self.mask = mask;
        self
    }

    pub fn device(mut self, device: &str) -> Self {
        self.device = device.to_string();
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Takes the batch size, epochs, seed and device from `settings`.
    pub fn settings(self, settings: &Settings) -> Self {
        self.batch_size(settings.batch_size)
            .epochs(settings.epochs)
            .seed(settings.seed)
            .device(&settings.device)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` for a zero batch size or epoch count, an empty dataset or a
    /// mask that doesn't broadcast to the dataset's targets, `MlErr::DeviceUnavailable` for
    /// an unknown device.
    pub fn build(self) -> Result<TrainingConfig<D, O, S, L>> {
        let batch_size = positive("batch_size", self.batch_size)?;
        let epochs = positive("epochs", self.epochs)?;
        let device = Device::parse(&self.device)?;
        check_data(&self.dataset, &self.loss_fn, &self.mask)?;

        Ok(TrainingConfig {
            dataset: self.dataset,
            optimizer: self.optimizer,
            scheduler: self.scheduler,
            loss_fn: self.loss_fn,
            batch_size,
            mask: self.mask,
            epochs,
            device,
            seed: self.seed,
        })
    }
}

/// Everything an evaluation pass needs, validated once at construction.
pub struct EvaluationConfig<D, L> {
    pub(super) dataset: D,
    pub(super) loss_fn: L,
    pub(super) batch_size: NonZeroUsize,
    pub(super) mask: Mask,
    pub(super) device: Device,
    pub(super) seed: u64,
}

impl<D, L> EvaluationConfig<D, L>
where
    D: Dataset,
    L: LossFn,
{
    /// Starts building an `EvaluationConfig`, with the same defaults as training.
    pub fn builder(dataset: D, loss_fn: L) -> EvaluationConfigBuilder<D, L> {
        EvaluationConfigBuilder {
            dataset,
            loss_fn,
            batch_size: 1,
            mask: Mask::Unmasked,
            device: Device::Cpu.as_str().to_string(),
            seed: 0,
        }
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

pub struct EvaluationConfigBuilder<D, L> {
    dataset: D,
    loss_fn: L,
    batch_size: usize,
    mask: Mask,
    device: String,
    seed: u64,
}

impl<D, L> EvaluationConfigBuilder<D, L>
where
    D: Dataset,
    L: LossFn,
{
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn mask(mut self, mask: Mask) -> Self {
        self.mask = mask;
        self
    }

    pub fn device(mut self, device: &str) -> Self {
        self.device = device.to_string();
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn settings(self, settings: &Settings) -> Self {
        self.batch_size(settings.batch_size)
            .seed(settings.seed)
            .device(&settings.device)
    }

    /// Validates the configuration, with the same rules as training.
    pub fn build(self) -> Result<EvaluationConfig<D, L>> {
        let batch_size = positive("batch_size", self.batch_size)?;
        let device = Device::parse(&self.device)?;
        check_data(&self.dataset, &self.loss_fn, &self.mask)?;

        Ok(EvaluationConfig {
            dataset: self.dataset,
            loss_fn: self.loss_fn,
            batch_size,
            mask: self.mask,
            device,
            seed: self.seed,
        })
    }
}

fn positive(name: &str, value: usize) -> Result<NonZeroUsize> {
    NonZeroUsize::new(value)
        .ok_or_else(|| MlErr::InvalidConfig(format!("{name} must be positive")))
}

/// The mask must be accepted by the loss and broadcast to a single target sample so it fits
/// every batch, the last and smaller one included.
fn check_data<D: Dataset, L: LossFn>(dataset: &D, loss_fn: &L, mask: &Mask) -> Result<()> {
    if dataset.is_empty() {
        return Err(MlErr::InvalidConfig("the dataset is empty".into()));
    }

    loss_fn.check_mask(mask)?;

    let (_, target) = dataset.get(0)?;
    mask.check(target.shape())
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, Array4};

    use super::*;
    use crate::{
        arch::loss::{Crps, Mse},
        dataset::InMemoryDataset,
        optimization::GradientDescent,
        scheduling::ConstantLr,
    };

    fn dataset() -> InMemoryDataset {
        InMemoryDataset::new(Array4::zeros((4, 1, 4, 4)), Array4::zeros((4, 1, 4, 4))).unwrap()
    }

    fn builder() -> TrainingConfigBuilder<InMemoryDataset, GradientDescent, ConstantLr, Mse> {
        TrainingConfig::builder(dataset(), GradientDescent::new(1, 0.1), ConstantLr, Mse)
    }

    #[test]
    fn zero_batch_size_fails_fast() {
        let result = builder().batch_size(0).build();
        assert!(matches!(result, Err(MlErr::InvalidConfig(_))));

        let result = builder().epochs(0).build();
        assert!(matches!(result, Err(MlErr::InvalidConfig(_))));
    }

    #[test]
    fn unknown_devices_are_unavailable() {
        let result = builder().device("tpu").build();
        assert!(matches!(result, Err(MlErr::DeviceUnavailable(_))));
    }

    #[test]
    fn mask_must_fit_the_targets() {
        let mask = Mask::new(Array2::ones((3, 3)).into_dyn()).unwrap();
        assert!(builder().mask(mask).build().is_err());

        let mask = Mask::new(Array2::ones((4, 4)).into_dyn()).unwrap();
        assert!(builder().mask(mask).build().is_ok());
    }

    #[test]
    fn ensemble_losses_refuse_masks() {
        let mask = Mask::new(Array2::ones((4, 4)).into_dyn()).unwrap();

        let result = EvaluationConfig::builder(dataset(), Crps).mask(mask).build();
        assert!(matches!(result, Err(MlErr::InvalidConfig(_))));
        assert!(EvaluationConfig::builder(dataset(), Crps).build().is_ok());
    }

    #[test]
    fn settings_are_applied() {
        let json = r#"{ "batch_size": 2, "epochs": 3, "seed": 9 }"#;
        let settings = Settings::from_json(json).unwrap();
        let config = builder().settings(&settings).build().unwrap();

        assert_eq!(config.batch_size(), 2);
        assert_eq!(config.epochs(), 3);
        assert_eq!(config.seed(), 9);
        assert_eq!(config.device(), Device::Cpu);
    }

    #[test]
    fn evaluation_rejects_empty_datasets() {
        let empty = Array4::zeros((0, 1, 2, 2));
        let dataset = InMemoryDataset::new(empty.clone(), empty).unwrap();
        let result = EvaluationConfig::builder(dataset, Mse).build();

        assert!(matches!(result, Err(MlErr::InvalidConfig(_))));
    }
}
