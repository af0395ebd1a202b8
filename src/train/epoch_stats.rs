use serde::{Serialize, Deserialize};

/// Per-epoch statistics recorded by `Trainer::fit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Last epoch number the `fit` call that ran this epoch could reach.
    pub total_epochs: usize,
    /// Mean training loss over all samples in this epoch.
    pub train_loss: f64,
    /// Mean validation loss after this epoch's updates.
    pub val_loss: f64,
    /// Training accuracy in [0, 100]; classification only.
    pub train_accuracy: Option<f64>,
    /// Validation accuracy in [0, 100]; classification only.
    pub val_accuracy: Option<f64>,
    /// Whether early stopping requested a stop after this epoch.
    pub stopped: bool,
    /// Wall-clock duration of the train and validation passes in milliseconds.
    pub elapsed_ms: u64,
}
