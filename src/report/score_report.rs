use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::train::checkpoint::{write_json, CheckpointSink};
use crate::train::early_stopping::{EarlyStopping, StopMode};

/// Snapshot of an early-stopping policy's score history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// "Accuracy" or "Loss".
    pub metric: String,
    pub mode: StopMode,
    pub best_score: Option<f64>,
    pub best_epoch: Option<usize>,
    pub train: Vec<f64>,
    pub validation: Vec<f64>,
}

impl ScoreReport {
    pub fn from_policy<S: CheckpointSink>(policy: &EarlyStopping<S>) -> ScoreReport {
        ScoreReport {
            metric: policy.mode().metric_name().to_string(),
            mode: policy.mode(),
            best_score: policy.best_score(),
            best_epoch: policy.best_epoch(),
            train: policy.history().train().to_vec(),
            validation: policy.history().validation().to_vec(),
        }
    }

    pub fn title(&self) -> String {
        match self.best_score {
            Some(best) => format!("Model performance (best {}: {best:.4})", self.metric),
            None => format!("Model performance (no {} recorded)", self.metric.to_lowercase()),
        }
    }

    /// Plain-text table, one row per epoch, best epoch marked with `*`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title());
        let _ = writeln!(out, "{:>6}  {:>14}  {:>14}", "epoch", format!("train {}", self.metric), format!("val {}", self.metric));
        for (i, (train, val)) in self.train.iter().zip(&self.validation).enumerate() {
            let marker = if self.best_epoch == Some(i + 1) { " *" } else { "" };
            let _ = writeln!(out, "{:>6}  {train:>14.4}  {val:>14.4}{marker}", i + 1);
        }
        out
    }
}

/// Consumer of finished score histories.
pub trait ScoreReporter {
    fn report(&mut self, report: &ScoreReport) -> Result<()>;
}

/// Writes the rendered text table to any writer.
pub struct TextReporter<W: Write> {
    writer: W,
}

impl<W: Write> TextReporter<W> {
    pub fn new(writer: W) -> Self {
        TextReporter { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ScoreReporter for TextReporter<W> {
    fn report(&mut self, report: &ScoreReport) -> Result<()> {
        self.writer.write_all(report.render().as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Serialises the report as pretty JSON, e.g. for external plotting.
pub struct JsonReporter {
    path: PathBuf,
}

impl JsonReporter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonReporter { path: path.as_ref().to_path_buf() }
    }
}

impl ScoreReporter for JsonReporter {
    fn report(&mut self, report: &ScoreReport) -> Result<()> {
        let file = std::fs::File::create(&self.path)?;
        write_json(file, report)?;
        Ok(())
    }
}
