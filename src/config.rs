//! TOML configuration for training runs.
//!
//! ```toml
//! task = "classification"
//! num_classes = 3
//!
//! [data]
//! path = "dataset/movies_kb.csv"
//! target = "quality"
//! columns = ["genre", "rating", "budget", "runtime"]
//!
//! [training]
//! patience = 10
//!
//! [model]
//! hidden = [64, 64, 32, 16, 8]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::provider::TabularFeatureProvider;
use crate::error::{Error, Result};
use crate::network::spec::ArchitectureSpec;
use crate::task::{Task, TaskKind};
use crate::train::train_config::TrainConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub task: TaskKind,
    /// Required iff `task = "classification"`.
    #[serde(default)]
    pub num_classes: Option<usize>,
    pub data: DataConfig,
    #[serde(default)]
    pub training: TrainConfig,
    #[serde(default)]
    pub model: ArchitectureSpec,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV export of the knowledge base; may be supplied on the command line instead.
    #[serde(default)]
    pub path: Option<PathBuf>,
    pub target: String,
    pub columns: Vec<String>,
    #[serde(default = "default_test_split")]
    pub test_split: f64,
    #[serde(default = "default_standardize")]
    pub standardize: bool,
}

fn default_test_split() -> f64 {
    0.2
}

fn default_standardize() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub directory: PathBuf,
    /// Defaults to `{task}-net.json`.
    pub model_name: Option<String>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        CheckpointConfig {
            directory: PathBuf::from("nets"),
            model_name: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
        Config::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config> {
        toml::from_str(contents)
            .map_err(|e| Error::config(format!("failed to parse config: {e}")))
    }

    pub fn task(&self) -> Result<Task> {
        Task::new(self.task, self.num_classes)
    }

    /// Name of the checkpoint file inside `checkpoint.directory`.
    pub fn model_name(&self) -> Result<String> {
        Ok(match &self.checkpoint.model_name {
            Some(name) => name.clone(),
            None => format!("{}-net.json", self.task()?),
        })
    }

    pub fn provider(&self) -> TabularFeatureProvider {
        TabularFeatureProvider {
            target: self.data.target.clone(),
            test_split: self.data.test_split,
            standardize: self.data.standardize,
        }
    }

    /// Checks every option that can be checked without looking at data.
    pub fn validate(&self) -> Result<()> {
        self.task()?;
        self.training.validate()?;
        self.model.validate()?;
        if self.data.columns.is_empty() {
            return Err(Error::config("data.columns must name at least one feature column"));
        }
        if !(self.data.test_split > 0.0 && self.data.test_split < 1.0) {
            return Err(Error::config(format!(
                "data.test_split must be in (0, 1), got {}",
                self.data.test_split
            )));
        }
        if self.model_name()?.is_empty() {
            return Err(Error::config("checkpoint.model_name must not be empty"));
        }
        Ok(())
    }
}
