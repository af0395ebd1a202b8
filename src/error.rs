use std::path::PathBuf;

use thiserror::Error;

use crate::train::epoch_runner::RunMode;

/// Every failure the training engine can surface.
///
/// All variants are fatal for the run that produced them; nothing in the crate
/// retries.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration, raised before any epoch runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A pass was requested over a view with zero samples.
    #[error("cannot run a {mode} pass over an empty view")]
    EmptyView { mode: RunMode },

    /// A sample produced a NaN or infinite loss.
    #[error("non-finite loss ({loss}) during {mode} pass at batch {batch}")]
    NumericInstability { mode: RunMode, batch: usize, loss: f64 },

    /// Persisting the best-model snapshot failed.
    #[error("failed to write checkpoint {}", path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed table contents or labels that do not fit the task.
    #[error("data error: {0}")]
    Data(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
