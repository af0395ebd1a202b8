pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod task;
pub mod train;
pub mod report;
pub mod config;
pub mod error;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::{ArchitectureBuilder, ArchitectureSpec, Model, Network};
pub use data::{DatasetPartitioner, DatasetView, FeatureProvider, PreparedData, Sample, Table, TabularFeatureProvider};
pub use task::{Task, TaskKind};
pub use train::{EarlyStopping, EpochOutcome, EpochRunner, FitSummary, RunMode, StopMode, TrainConfig, Trainer};
pub use report::ScoreReport;
pub use config::Config;
pub use error::{Error, Result};
