use serde::{Deserialize, Serialize};

use crate::network::spec::ArchitectureSpec;
use crate::task::Task;
use crate::train::early_stopping::StopMode;

/// Describes the snapshot stored alongside the weights in a checkpoint file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub task: Task,
    pub input_dim: usize,
    pub architecture: ArchitectureSpec,
    pub mode: StopMode,
    /// 1-based epoch whose validation score produced this snapshot.
    pub epoch: usize,
    pub best_score: f64,
    /// Column names of the encoded feature vector, in input order.
    #[serde(default)]
    pub feature_names: Vec<String>,
}
