use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::optim::optimizer::OptimizerKind;

/// Hyperparameters for a `Trainer` run.
///
/// # Fields
/// - `batch_size`: samples per mini-batch; the last batch may be shorter
/// - `patience`: non-improving epochs tolerated before stopping
/// - `learning_rate`: optimizer step size
/// - `max_epochs`: upper bound on epochs for `fit`
/// - `val_split`: fraction of the training portion held out for validation
/// - `optimizer`: `adam` or `sgd`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub patience: usize,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub val_split: f64,
    pub optimizer: OptimizerKind,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            batch_size: 64,
            patience: 15,
            learning_rate: 1e-2,
            max_epochs: 100,
            val_split: 0.2,
            optimizer: OptimizerKind::Adam,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if self.patience == 0 {
            return Err(Error::config("patience must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.val_split > 0.0 && self.val_split < 1.0) {
            return Err(Error::config(format!("val_split must be in (0, 1), got {}", self.val_split)));
        }
        Ok(())
    }
}
