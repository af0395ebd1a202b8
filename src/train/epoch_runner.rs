use std::fmt;
use std::num::NonZeroUsize;

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::data::dataset::DatasetView;
use crate::error::{Error, Result};
use crate::network::model::Model;
use crate::optim::optimizer::Optimizer;
use crate::task::Task;

/// Which pass the runner is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Parameters are updated once per batch; dropout is active.
    Train,
    /// Frozen parameters over the validation view.
    Validate,
    /// Frozen parameters over the test view.
    Test,
}

impl RunMode {
    pub fn is_training(self) -> bool {
        self == RunMode::Train
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Train => write!(f, "train"),
            RunMode::Validate => write!(f, "validation"),
            RunMode::Test => write!(f, "test"),
        }
    }
}

/// Result of one full pass over a view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochOutcome {
    /// Sum of per-sample losses divided by the number of samples.
    pub loss: f64,
    /// Percentage of arg-max hits in [0, 100]; `None` for regression.
    pub accuracy: Option<f64>,
}

impl EpochOutcome {
    /// The score early stopping watches: accuracy for classifiers, loss for
    /// regressors.
    pub fn score(&self, task: Task) -> f64 {
        match (task, self.accuracy) {
            (Task::Classification { .. }, Some(accuracy)) => accuracy,
            _ => self.loss,
        }
    }
}

/// Executes train and evaluation passes for a model.
///
/// The runner owns the optimizer, so train mode is the only place model
/// parameters are ever written.
pub struct EpochRunner {
    batch_size: NonZeroUsize,
    optimizer: Box<dyn Optimizer>,
}

impl EpochRunner {
    pub fn new(batch_size: usize, optimizer: Box<dyn Optimizer>) -> Result<EpochRunner> {
        let batch_size = NonZeroUsize::new(batch_size)
            .ok_or_else(|| Error::config("batch_size must be at least 1"))?;
        Ok(EpochRunner { batch_size, optimizer })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    /// Runs one pass over `view` and returns its mean loss and accuracy.
    ///
    /// In train mode every batch accumulates per-sample gradients into fresh
    /// zeroed buffers, averages them and applies a single optimizer step.
    /// Evaluation modes only run forward passes with dropout disabled.
    pub fn run(&mut self, model: &mut Model, view: &DatasetView, mode: RunMode) -> Result<EpochOutcome> {
        if view.is_empty() {
            return Err(Error::EmptyView { mode });
        }

        let task = model.task();
        let training = mode.is_training();
        let mut total_loss = 0.0;
        let mut correct = 0usize;
        let mut n_batches = 0usize;

        for (batch_idx, batch) in view.batches(self.batch_size).enumerate() {
            let mut acc_grads = training.then(|| model.network().zero_grads());
            let mut batch_loss = 0.0;

            for sample in &batch {
                let output = model.forward(&sample.features, training);

                let loss = task.loss(&output, sample.label);
                if !loss.is_finite() {
                    return Err(Error::NumericInstability { mode, batch: batch_idx, loss });
                }
                batch_loss += loss;

                if task.is_correct(&output, sample.label) == Some(true) {
                    correct += 1;
                }

                if let Some(acc) = acc_grads.as_mut() {
                    let error = task.loss_gradient(&output, sample.label);
                    let grads = model.network().backward(&sample.features, error);
                    for ((w_acc, b_acc), (w_grad, b_grad)) in acc.iter_mut().zip(grads.iter()) {
                        w_acc.add_assign(w_grad);
                        b_acc.add_assign(b_grad);
                    }
                }
            }

            if let Some(acc) = acc_grads {
                // Average over the actual (possibly short) batch, then apply.
                let inv_batch = 1.0 / batch.len() as f64;
                let averaged: Vec<_> = acc.iter()
                    .map(|(w, b)| (w.map(|x| x * inv_batch), b.map(|x| x * inv_batch)))
                    .collect();
                if averaged.iter().any(|(w, b)| !w.all_finite() || !b.all_finite()) {
                    return Err(Error::NumericInstability { mode, batch: batch_idx, loss: batch_loss });
                }
                self.optimizer.step(&mut model.network_mut().layers, &averaged);
            }

            total_loss += batch_loss;
            n_batches += 1;
        }

        let n = view.len() as f64;
        let outcome = EpochOutcome {
            loss: total_loss / n,
            accuracy: task.is_classification().then(|| 100.0 * correct as f64 / n),
        };
        debug!(%mode, batches = n_batches, samples = view.len(), loss = outcome.loss, "pass complete");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::data::dataset::Sample;
    use crate::network::spec::ArchitectureSpec;
    use crate::optim::{Adam, Sgd};

    fn spec() -> ArchitectureSpec {
        ArchitectureSpec {
            hidden: vec![8, 4],
            dropout: 0.0,
            activation: ActivationFunction::Tanh,
            init_std: 0.5,
        }
    }

    fn linear_samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let x = i as f64 / n as f64;
                Sample::new(vec![x, 1.0 - x], 2.0 * x - 0.5)
            })
            .collect()
    }

    fn two_class_samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let class = i % 2;
                let x = if class == 0 { -1.0 } else { 1.0 };
                Sample::new(vec![x, 0.1 * (i as f64).sin()], class as f64)
            })
            .collect()
    }

    #[test]
    fn test_empty_view_is_rejected() {
        let mut model = Model::new(Task::Regression, 2, &spec()).unwrap();
        let mut runner = EpochRunner::new(4, Box::new(Sgd::new(0.01))).unwrap();
        let err = runner.run(&mut model, &DatasetView::fixed(vec![]), RunMode::Validate).unwrap_err();
        assert!(matches!(err, Error::EmptyView { mode: RunMode::Validate }));
    }

    #[test]
    fn test_zero_batch_size_is_configuration_error() {
        assert!(matches!(
            EpochRunner::new(0, Box::new(Sgd::new(0.01))),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_regression_has_no_accuracy() {
        let mut model = Model::new(Task::Regression, 2, &spec()).unwrap();
        let mut runner = EpochRunner::new(3, Box::new(Adam::new(0.01))).unwrap();
        let view = DatasetView::fixed(linear_samples(10));
        let out = runner.run(&mut model, &view, RunMode::Test).unwrap();
        assert!(out.loss.is_finite() && out.loss >= 0.0);
        assert_eq!(out.accuracy, None);
        assert_eq!(out.score(Task::Regression), out.loss);
    }

    #[test]
    fn test_eval_is_read_only_and_repeatable() {
        let mut model = Model::new(Task::Regression, 2, &spec()).unwrap();
        let before = model.network().layers[0].weights.clone();
        let mut runner = EpochRunner::new(4, Box::new(Adam::new(0.05))).unwrap();
        let view = DatasetView::fixed(linear_samples(11));
        let a = runner.run(&mut model, &view, RunMode::Validate).unwrap();
        let b = runner.run(&mut model, &view, RunMode::Test).unwrap();
        assert_eq!(a, b);
        assert_eq!(model.network().layers[0].weights, before);
    }

    #[test]
    fn test_loss_is_mean_per_sample_not_per_batch() {
        // Uneven batches (4 + 1): the mean must weight every sample equally.
        let mut model = Model::new(Task::Regression, 2, &spec()).unwrap();
        let samples = linear_samples(5);
        let expected: f64 = samples.iter()
            .map(|s| {
                let out = model.forward(&s.features, false);
                (out[0] - s.label).powi(2)
            })
            .sum::<f64>() / 5.0;
        let mut runner = EpochRunner::new(4, Box::new(Sgd::new(0.01))).unwrap();
        let out = runner.run(&mut model, &DatasetView::fixed(samples), RunMode::Validate).unwrap();
        assert!((out.loss - expected).abs() < 1e-12);
    }

    #[test]
    fn test_training_reduces_regression_loss() {
        let mut model = Model::new(Task::Regression, 2, &spec()).unwrap();
        let mut runner = EpochRunner::new(8, Box::new(Adam::new(0.01))).unwrap();
        let train = DatasetView::shuffled(linear_samples(64));
        let eval = DatasetView::fixed(linear_samples(64));
        let initial = runner.run(&mut model, &eval, RunMode::Validate).unwrap().loss;
        for _ in 0..60 {
            runner.run(&mut model, &train, RunMode::Train).unwrap();
        }
        let trained = runner.run(&mut model, &eval, RunMode::Validate).unwrap().loss;
        assert!(trained < initial, "loss went from {initial} to {trained}");
    }

    #[test]
    fn test_classifier_learns_separable_classes() {
        let task = Task::Classification { num_classes: 2 };
        let mut model = Model::new(task, 2, &spec()).unwrap();
        let mut runner = EpochRunner::new(8, Box::new(Adam::new(0.01))).unwrap();
        let train = DatasetView::shuffled(two_class_samples(40));
        for _ in 0..80 {
            let out = runner.run(&mut model, &train, RunMode::Train).unwrap();
            let acc = out.accuracy.unwrap();
            assert!((0.0..=100.0).contains(&acc));
            assert!(out.loss.is_finite() && out.loss >= 0.0);
        }
        let eval = runner
            .run(&mut model, &DatasetView::fixed(two_class_samples(40)), RunMode::Test)
            .unwrap();
        assert!(eval.accuracy.unwrap() >= 90.0, "accuracy = {:?}", eval.accuracy);
        assert_eq!(eval.score(task), eval.accuracy.unwrap());
    }

    #[test]
    fn test_non_finite_loss_is_reported() {
        let mut model = Model::new(Task::Regression, 2, &spec()).unwrap();
        let mut runner = EpochRunner::new(2, Box::new(Sgd::new(0.01))).unwrap();
        let view = DatasetView::fixed(vec![
            Sample::new(vec![0.1, 0.2], 1.0),
            Sample::new(vec![0.3, 0.4], 1.0),
            Sample::new(vec![f64::NAN, 0.0], 1.0),
        ]);
        let before = model.network().layers[0].weights.clone();
        let err = runner.run(&mut model, &view, RunMode::Train).unwrap_err();
        assert!(matches!(err, Error::NumericInstability { mode: RunMode::Train, batch: 1, .. }));
        // The first batch was applied, the poisoned one was not.
        assert!(model.network().layers[0].weights.all_finite());
        assert_ne!(model.network().layers[0].weights, before);
    }
}
