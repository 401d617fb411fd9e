use log::{debug, error, info};
use rand::{SeedableRng, rngs::StdRng};

use super::{TrainingConfig, batch_mean::BatchMean};
use crate::{
    arch::{Mode, Network, UNet, loss::LossFn},
    dataset::{DataLoader, Dataset, shard_range},
    error::{MlErr, Result},
    optimization::Optimizer,
    scheduling::Scheduler,
    synchronization::Synchronizer,
};

impl UNet {
    /// Trains this network as one member of a data parallel group.
    ///
    /// The member trains on its own shard of the dataset, reshuffled every epoch with a
    /// generator seeded by `seed + rank`. For every batch it makes a forward pass, computes
    /// the masked loss, backpropagates, averages the gradient with the rest of the group and
    /// then steps the optimizer and the scheduler. With more than one member the initial
    /// parameters are averaged first, so every replica starts and stays identical.
    ///
    /// # Arguments
    /// * `config` - The run's configuration, consumed by the run.
    /// * `sync` - This member's handle to the synchronization group.
    ///
    /// # Returns
    /// The mean loss of every epoch, weighted by batch size and averaged across the group.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` before the first epoch if the optimizer wasn't built for this
    /// network or the shard can't fill a batch, `MlErr::NonFiniteLoss` as soon as the group's
    /// loss stops being finite, and any shape error of the forward and backward passes.
    pub async fn train_with_configs<D, O, S, L, Y>(
        &mut self,
        config: TrainingConfig<D, O, S, L>,
        sync: &Y,
    ) -> Result<Vec<f32>>
    where
        D: Dataset,
        O: Optimizer,
        S: Scheduler,
        L: LossFn,
        Y: Synchronizer + Sync,
    {
        let TrainingConfig {
            dataset,
            mut optimizer,
            mut scheduler,
            loss_fn,
            batch_size,
            mask,
            epochs,
            device,
            seed,
        } = config;

        let (rank, world_size) = (sync.rank(), sync.world_size());
        let size = Network::size(self);

        if optimizer.size() != size {
            return Err(MlErr::InvalidConfig(format!(
                "the optimizer was built for {} parameters but the network has {size}",
                optimizer.size()
            )));
        }

        let shard = shard_range(dataset.len(), rank, world_size)?;
        if shard.len() < batch_size.get() {
            return Err(MlErr::InvalidConfig(format!(
                "rank {rank} holds {} samples, fewer than a batch of {batch_size}",
                shard.len()
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(rank as u64));
        let mut loader = DataLoader::new(shard, batch_size.get());
        self.set_mode(Mode::Train);

        info!(
            rank = rank,
            world_size = world_size,
            device = device.as_str(),
            epochs = epochs.get(),
            samples = loader.len(),
            params = size;
            "starting training"
        );

        if world_size > 1 {
            // Every member blocks here until the whole group arrives.
            debug!(rank = rank; "averaging initial parameters");
            sync.step(&mut self.store.params, 0.).await?;
        }

        let mut losses = Vec::with_capacity(epochs.get());
        let mut best = f32::INFINITY;

        for epoch in 1..=epochs.get() {
            loader.shuffle(&mut rng);
            let mut epoch_loss = BatchMean::default();

            for (batch, indices) in loader.batches().enumerate() {
                let (x, y) = dataset.batch(indices)?;

                self.zero_grad();
                let y_pred = self.forward(x)?;
                let (loss, d) = loss_fn.loss_and_grad(y_pred.view(), y.view(), &mask)?;
                self.backward(d)?;

                let loss = sync.step(&mut self.store.grad, loss).await?;
                if !loss.is_finite() {
                    error!(
                        rank = rank,
                        epoch = epoch,
                        batch = batch;
                        "loss is not finite, aborting"
                    );
                    return Err(MlErr::NonFiniteLoss { epoch, batch, loss });
                }

                optimizer.update_params(&self.store.grad, &mut self.store.params)?;
                scheduler.step(&mut optimizer);
                // Every rank's shard has the same length, so its batch sizes match the group's.
                epoch_loss.add(loss, indices.len());
            }

            let loss = epoch_loss.mean();
            info!(
                rank = rank,
                epoch = epoch,
                loss = loss,
                learning_rate = optimizer.learning_rate();
                "epoch finished"
            );

            if loss < best {
                best = loss;
                debug!(rank = rank, epoch = epoch, loss = loss; "new best loss");
            }

            losses.push(loss);
        }

        Ok(losses)
    }
}
