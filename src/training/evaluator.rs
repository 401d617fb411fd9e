use log::{debug, error};
use ndarray::Array4;

use super::{EvaluationConfig, batch_mean::BatchMean};
use crate::{
    arch::{Mode, Network, UNet, loss::LossFn},
    dataset::{DataLoader, Dataset},
    error::{MlErr, Result},
};

impl UNet {
    /// Evaluates this network over a dataset, in order and without touching its parameters.
    ///
    /// Batch normalization runs on its running statistics for the pass, the previous mode is
    /// restored afterwards.
    ///
    /// # Returns
    /// The mean masked loss, weighted by batch size, and the prediction of every batch in
    /// dataset order.
    pub fn eval_with_configs<D, L>(
        &mut self,
        config: &EvaluationConfig<D, L>,
    ) -> Result<(f32, Vec<Array4<f32>>)>
    where
        D: Dataset,
        L: LossFn,
    {
        let previous = self.mode();
        self.set_mode(Mode::Eval);
        let result = self.evaluate(config);
        self.set_mode(previous);
        result
    }

    fn evaluate<D, L>(
        &mut self,
        config: &EvaluationConfig<D, L>,
    ) -> Result<(f32, Vec<Array4<f32>>)>
    where
        D: Dataset,
        L: LossFn,
    {
        let dataset = &config.dataset;
        let loader = DataLoader::new(0..dataset.len(), config.batch_size.get());

        debug!(
            device = config.device.as_str(),
            samples = loader.len(),
            batches = loader.num_batches();
            "starting evaluation"
        );

        let mut mean = BatchMean::default();
        let mut predictions = Vec::with_capacity(loader.num_batches());

        for (batch, indices) in loader.batches().enumerate() {
            let (x, y) = dataset.batch(indices)?;
            let y_pred = self.forward(x)?;
            let loss = config.loss_fn.loss(y_pred.view(), y.view(), &config.mask)?;

            if !loss.is_finite() {
                error!(batch = batch; "evaluation loss is not finite");
                return Err(MlErr::NonFiniteLoss {
                    epoch: 0,
                    batch,
                    loss,
                });
            }

            mean.add(loss, indices.len());
            predictions.push(y_pred);
        }

        let mean = mean.mean();
        debug!(loss = mean; "evaluation finished");
        Ok((mean, predictions))
    }
}
