use std::time::Instant;

use serde::{Serialize, Deserialize};
use tracing::info;

use crate::config::Config;
use crate::data::dataset::{DatasetPartitioner, Partition, PreparedData};
use crate::data::provider::FeatureProvider;
use crate::data::table::Table;
use crate::error::{Error, Result};
use crate::network::metadata::CheckpointMetadata;
use crate::network::model::Model;
use crate::network::spec::ArchitectureSpec;
use crate::report::ScoreReport;
use crate::task::Task;
use crate::train::checkpoint::{load_checkpoint, CheckpointSink, FileCheckpoint};
use crate::train::early_stopping::EarlyStopping;
use crate::train::epoch_runner::{EpochOutcome, EpochRunner, RunMode};
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;

/// Outcome of one `fit` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub epochs_run: usize,
    pub stopped_early: bool,
    pub best_score: Option<f64>,
    pub best_epoch: Option<usize>,
    pub epochs: Vec<EpochStats>,
}

/// Owns the model, its three data views, the epoch runner and the
/// early-stopping policy, and drives the epoch loop.
pub struct Trainer<S: CheckpointSink = FileCheckpoint> {
    model: Model,
    partition: Partition,
    runner: EpochRunner,
    early_stopping: EarlyStopping<S>,
}

impl<S: CheckpointSink> Trainer<S> {
    /// Validates labels against the task, partitions the training portion and
    /// initialises a fresh model. Fails before any epoch on bad configuration.
    pub fn new(
        task: Task,
        data: PreparedData,
        architecture: &ArchitectureSpec,
        config: &TrainConfig,
        sink: S,
    ) -> Result<Trainer<S>> {
        config.validate()?;
        let input_dim = data.input_dim()?;
        for label in data.train_labels.iter().chain(&data.test_labels) {
            task.validate_label(*label)?;
        }

        let partition = DatasetPartitioner::new(config.val_split)?.split(data)?;
        let model = Model::new(task, input_dim, architecture)?;
        let runner = EpochRunner::new(config.batch_size, config.optimizer.build(config.learning_rate))?;
        let early_stopping = EarlyStopping::builder(sink)
            .patience(config.patience)
            .mode(task.stop_mode())
            .build()?;

        info!(
            %task,
            input_dim,
            train = partition.train.len(),
            validation = partition.validation.len(),
            test = partition.test.len(),
            "trainer ready"
        );

        Ok(Trainer { model, partition, runner, early_stopping })
    }

    /// Trains until early stopping triggers or `max_epochs` epochs have run.
    pub fn fit(&mut self, max_epochs: usize) -> Result<FitSummary> {
        let task = self.model.task();
        let first_epoch = self.early_stopping.history().len() + 1;
        let last_epoch = first_epoch + max_epochs - 1;
        let mut epochs = Vec::new();

        for epoch in first_epoch..=last_epoch {
            if self.early_stopping.is_stopped() {
                break;
            }

            let t_start = Instant::now();
            let train = self.runner.run(&mut self.model, &self.partition.train, RunMode::Train)?;
            let val = self.runner.run(&mut self.model, &self.partition.validation, RunMode::Validate)?;
            let elapsed_ms = t_start.elapsed().as_millis() as u64;

            let (train_score, val_score) = (train.score(task), val.score(task));
            let stop = self.early_stopping.observe(train_score, val_score, &self.model)?;

            match (train.accuracy, val.accuracy) {
                (Some(train_acc), Some(val_acc)) => info!(
                    "epoch {epoch}/{last_epoch}: train loss {:.4}, train accuracy {train_acc:.4} | val loss {:.4}, val accuracy {val_acc:.4}",
                    train.loss, val.loss
                ),
                _ => info!("epoch {epoch}/{last_epoch}: train loss {:.4} | val loss {:.4}", train.loss, val.loss),
            }

            epochs.push(EpochStats {
                epoch,
                total_epochs: last_epoch,
                train_loss: train.loss,
                val_loss: val.loss,
                train_accuracy: train.accuracy,
                val_accuracy: val.accuracy,
                stopped: stop,
                elapsed_ms,
            });

            if stop {
                info!("early stopping at epoch {epoch}");
                break;
            }
        }

        Ok(FitSummary {
            epochs_run: epochs.len(),
            stopped_early: self.early_stopping.is_stopped(),
            best_score: self.early_stopping.best_score(),
            best_epoch: self.early_stopping.best_epoch(),
            epochs,
        })
    }

    /// Evaluates the current in-memory parameters on the test view.
    ///
    /// The best checkpoint is not reloaded first; call `restore_best` for
    /// that.
    pub fn test(&mut self) -> Result<EpochOutcome> {
        self.runner.run(&mut self.model, &self.partition.test, RunMode::Test)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn early_stopping(&self) -> &EarlyStopping<S> {
        &self.early_stopping
    }

    pub fn score_report(&self) -> ScoreReport {
        ScoreReport::from_policy(&self.early_stopping)
    }
}

impl Trainer<FileCheckpoint> {
    /// Builds the full pipeline from a configuration: feature preparation
    /// through `provider`, then a trainer checkpointing to the configured path.
    pub fn from_config(config: &Config, table: &Table, provider: &dyn FeatureProvider) -> Result<Self> {
        config.validate()?;
        let task = config.task()?;
        let data = provider.prepare(table, &config.data.columns, task)?;
        let sink = FileCheckpoint::new(
            &config.checkpoint.directory,
            &config.model_name()?,
            config.model.clone(),
            data.feature_names.clone(),
        );
        Trainer::new(task, data, &config.model, &config.training, sink)
    }

    /// Replaces the in-memory model with the best checkpoint on disk.
    pub fn restore_best(&mut self) -> Result<CheckpointMetadata> {
        let (metadata, model) = load_checkpoint(self.early_stopping.sink().path())?;
        if model.task() != self.model.task() || model.input_dim() != self.model.input_dim() {
            return Err(Error::config("checkpoint does not match the trainer's model"));
        }
        self.model = model;
        info!(epoch = metadata.epoch, score = metadata.best_score, "restored best checkpoint");
        Ok(metadata)
    }
}
