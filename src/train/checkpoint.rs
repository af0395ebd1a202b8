use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::network::metadata::CheckpointMetadata;
use crate::network::model::Model;
use crate::network::network::Network;
use crate::network::spec::ArchitectureSpec;
use crate::train::early_stopping::StopMode;

/// What the early-stopping policy reports when it records a new best.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Improvement {
    /// 1-based epoch.
    pub epoch: usize,
    pub score: f64,
    pub mode: StopMode,
}

/// Destination for best-model snapshots.
pub trait CheckpointSink {
    fn persist(&mut self, model: &Model, improvement: &Improvement) -> Result<()>;
}

/// Writes the snapshot as JSON to `{directory}/{model_name}`, replacing the
/// previous one.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
    architecture: ArchitectureSpec,
    feature_names: Vec<String>,
    writes: usize,
}

#[derive(Serialize)]
struct CheckpointFileRef<'a> {
    metadata: &'a CheckpointMetadata,
    network: &'a Network,
}

/// On-disk checkpoint layout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointFile {
    pub metadata: CheckpointMetadata,
    pub network: Network,
}

impl FileCheckpoint {
    pub fn new(
        directory: impl AsRef<Path>,
        model_name: &str,
        architecture: ArchitectureSpec,
        feature_names: Vec<String>,
    ) -> FileCheckpoint {
        FileCheckpoint {
            path: directory.as_ref().join(model_name),
            architecture,
            feature_names,
            writes: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of snapshots written so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Writes to `{path}.tmp` first and renames it over the previous
    /// snapshot, so a failed write leaves the old best intact.
    fn write(&self, metadata: &CheckpointMetadata, network: &Network) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut temp_name = self.path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);
        let file = fs::File::create(&temp_path)?;
        let result = write_json(&file, &CheckpointFileRef { metadata, network })
            .and_then(|()| file.sync_all())
            .and_then(|()| fs::rename(&temp_path, &self.path));
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}

/// Serialises `value` through a buffered writer and flushes it, so errors
/// from the final buffer are reported instead of lost on drop.
pub(crate) fn write_json<W: Write, T: Serialize>(writer: W, value: &T) -> io::Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writer.flush()
}

impl CheckpointSink for FileCheckpoint {
    fn persist(&mut self, model: &Model, improvement: &Improvement) -> Result<()> {
        let metadata = CheckpointMetadata {
            task: model.task(),
            input_dim: model.input_dim(),
            architecture: self.architecture.clone(),
            mode: improvement.mode,
            epoch: improvement.epoch,
            best_score: improvement.score,
            feature_names: self.feature_names.clone(),
        };
        self.write(&metadata, model.network())
            .map_err(|source| Error::Checkpoint { path: self.path.clone(), source })?;
        self.writes += 1;
        debug!(path = %self.path.display(), epoch = improvement.epoch, score = improvement.score, "checkpoint written");
        Ok(())
    }
}

/// Reads a checkpoint written by [`FileCheckpoint`] back into a model.
pub fn load_checkpoint(path: &Path) -> Result<(CheckpointMetadata, Model)> {
    let file = fs::File::open(path)?;
    let mut checkpoint: CheckpointFile = serde_json::from_reader(std::io::BufReader::new(file))?;
    checkpoint.network.reset_caches();
    let model = Model::from_network(checkpoint.metadata.task, checkpoint.network)?;
    Ok((checkpoint.metadata, model))
}

/// Keeps the latest snapshot in memory instead of on disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpoint {
    latest: Option<(Improvement, Network)>,
    writes: usize,
}

impl MemoryCheckpoint {
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn latest(&self) -> Option<&(Improvement, Network)> {
        self.latest.as_ref()
    }
}

impl CheckpointSink for MemoryCheckpoint {
    fn persist(&mut self, model: &Model, improvement: &Improvement) -> Result<()> {
        self.latest = Some((*improvement, model.network().clone()));
        self.writes += 1;
        Ok(())
    }
}
