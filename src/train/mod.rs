pub mod checkpoint;
pub mod early_stopping;
pub mod epoch_runner;
pub mod epoch_stats;
pub mod train_config;
pub mod trainer;

pub use checkpoint::{load_checkpoint, CheckpointSink, FileCheckpoint, Improvement, MemoryCheckpoint};
pub use early_stopping::{EarlyStopping, EarlyStoppingBuilder, ScoreHistory, StopMode};
pub use epoch_runner::{EpochOutcome, EpochRunner, RunMode};
pub use epoch_stats::EpochStats;
pub use train_config::TrainConfig;
pub use trainer::{FitSummary, Trainer};
