use std::fmt;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::loss::{CrossEntropyLoss, MseLoss};
use crate::train::early_stopping::StopMode;

/// Task name as it appears in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Regression,
    Classification,
}

/// The learning problem, carrying everything that differs between the two
/// model variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Task {
    Regression,
    Classification { num_classes: usize },
}

impl Task {
    /// `num_classes` is required for classification and ignored for regression.
    pub fn new(kind: TaskKind, num_classes: Option<usize>) -> Result<Task> {
        match (kind, num_classes) {
            (TaskKind::Regression, _) => Ok(Task::Regression),
            (TaskKind::Classification, Some(n)) if n >= 2 => Ok(Task::Classification { num_classes: n }),
            (TaskKind::Classification, Some(n)) => Err(Error::config(format!(
                "classification needs at least 2 classes, got num_classes = {n}"
            ))),
            (TaskKind::Classification, None) => Err(Error::config(
                "num_classes is required for classification",
            )),
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Regression => TaskKind::Regression,
            Task::Classification { .. } => TaskKind::Classification,
        }
    }

    pub fn is_classification(&self) -> bool {
        matches!(self, Task::Classification { .. })
    }

    /// Width of the network's final layer.
    pub fn output_width(&self) -> usize {
        match self {
            Task::Regression => 1,
            Task::Classification { num_classes } => *num_classes,
        }
    }

    /// Loss-like scores are minimised, accuracy-like scores maximised.
    pub fn stop_mode(&self) -> StopMode {
        match self {
            Task::Regression => StopMode::Min,
            Task::Classification { .. } => StopMode::Max,
        }
    }

    /// Per-sample loss of raw network output against a label.
    pub fn loss(&self, output: &[f64], label: f64) -> f64 {
        match self {
            Task::Regression => MseLoss::loss(output, &[label]),
            Task::Classification { .. } => CrossEntropyLoss::loss(output, label as usize),
        }
    }

    /// ∂L/∂output for one sample.
    pub fn loss_gradient(&self, output: &[f64], label: f64) -> Vec<f64> {
        match self {
            Task::Regression => MseLoss::derivative(output, &[label]),
            Task::Classification { .. } => CrossEntropyLoss::derivative(output, label as usize),
        }
    }

    /// Whether the arg-max prediction hits the label; `None` for regression.
    pub fn is_correct(&self, output: &[f64], label: f64) -> Option<bool> {
        match self {
            Task::Regression => None,
            Task::Classification { .. } => Some(argmax(output) == label as usize),
        }
    }

    /// Rejects labels that cannot be used with this task.
    pub fn validate_label(&self, label: f64) -> Result<()> {
        if !label.is_finite() {
            return Err(Error::data(format!("label {label} is not finite")));
        }
        if let Task::Classification { num_classes } = self {
            if label < 0.0 || label.fract() != 0.0 || label as usize >= *num_classes {
                return Err(Error::data(format!(
                    "label {label} is not a class index in [0, {num_classes})"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Regression => write!(f, "regression"),
            Task::Classification { .. } => write!(f, "classification"),
        }
    }
}

/// Index of the maximum element in a slice.
pub fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
