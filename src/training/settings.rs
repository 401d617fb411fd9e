use std::{fs, path::Path};

use ndarray::Array4;
use serde::Deserialize;

use crate::{
    dataset::{EnsembleDataset, downscale},
    error::{MlErr, Result},
    optimization::Adam,
    scheduling::StepLr,
};

/// Run settings, read from JSON. Every field is optional and falls back to its default.
///
/// ```json
/// { "batch_size": 8, "epochs": 10, "learning_rate": 1e-4, "coarsen": 2 }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub batch_size: usize,
    pub epochs: usize,
    pub seed: u64,
    pub device: String,
    pub learning_rate: f32,
    /// Steps between learning rate decays.
    pub step_size: usize,
    /// Learning rate decay factor.
    pub gamma: f32,
    /// Ensemble members used as input, half of them when absent.
    pub member_split: Option<usize>,
    /// Spatial coarsening factor applied to ensemble fields, 1 leaves them untouched.
    pub coarsen: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch_size: 8,
            epochs: 10,
            seed: 42,
            device: "cpu".into(),
            learning_rate: 1e-4,
            step_size: 3,
            gamma: 0.1,
            member_split: None,
            coarsen: 1,
        }
    }
}

impl Settings {
    /// Parses settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads settings from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| MlErr::Settings(format!("cannot read '{}': {e}", path.display())))?;

        Self::from_json(&content)
    }

    /// An Adam optimizer for `size` parameters at this learning rate.
    pub fn adam(&self, size: usize) -> Adam {
        Adam::with_learning_rate(size, self.learning_rate)
    }

    /// The step decay schedule of these settings.
    pub fn step_lr(&self) -> Result<StepLr> {
        StepLr::new(self.step_size, self.gamma)
    }

    /// Coarsens an ensemble field `(time, member, height, width)` and splits its members
    /// into inputs and targets, shuffled with this seed.
    pub fn ensemble_dataset(&self, field: Array4<f32>) -> Result<EnsembleDataset> {
        let field = match self.coarsen {
            0 | 1 => field,
            factor => downscale(field.view(), factor)?,
        };

        let members = field.dim().1;
        let split = self.member_split.unwrap_or(members / 2);
        EnsembleDataset::new(field, split, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    #[test]
    fn missing_fields_take_defaults() {
        let settings = Settings::from_json(r#"{ "epochs": 2 }"#).unwrap();

        assert_eq!(settings.epochs, 2);
        assert_eq!(settings.batch_size, 8);
        assert_eq!(settings.device, "cpu");
    }

    #[test]
    fn malformed_json_is_a_settings_error() {
        let result = Settings::from_json(r#"{ "epochs": "many" }"#);
        assert!(matches!(result, Err(MlErr::Settings(_))));
    }

    #[test]
    fn missing_files_are_reported() {
        let result = Settings::from_file("/nonexistent/settings.json");
        assert!(matches!(result, Err(MlErr::Settings(_))));
    }

    #[test]
    fn ensemble_dataset_is_coarsened() {
        let settings = Settings::from_json(r#"{ "coarsen": 2, "member_split": 1 }"#).unwrap();
        let dataset = settings.ensemble_dataset(Array4::ones((5, 3, 8, 6))).unwrap();

        let (x, y) = dataset.get(0).unwrap();
        assert_eq!(dataset.grid(), (4, 3));
        assert_eq!(x.dim(), (1, 4, 3));
        assert_eq!(y.dim(), (2, 4, 3));
    }
}
