use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::network::model::Model;
use crate::train::checkpoint::{CheckpointSink, Improvement};

/// Direction in which the monitored score improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// Lower is better (losses).
    Min,
    /// Higher is better (accuracies).
    Max,
}

impl StopMode {
    /// Strict comparison: equal scores are not an improvement.
    pub fn is_improvement(self, score: f64, best: f64) -> bool {
        match self {
            StopMode::Min => score < best,
            StopMode::Max => score > best,
        }
    }

    /// Human name of the score this mode is used with.
    pub fn metric_name(self) -> &'static str {
        match self {
            StopMode::Min => "Loss",
            StopMode::Max => "Accuracy",
        }
    }
}

/// Per-epoch train and validation scores, append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistory {
    train: Vec<f64>,
    validation: Vec<f64>,
}

impl ScoreHistory {
    pub fn push(&mut self, train_score: f64, val_score: f64) {
        self.train.push(train_score);
        self.validation.push(val_score);
    }

    pub fn train(&self) -> &[f64] {
        &self.train
    }

    pub fn validation(&self) -> &[f64] {
        &self.validation
    }

    pub fn len(&self) -> usize {
        self.validation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validation.is_empty()
    }
}

/// Patience-based early stopping with best-model checkpointing.
///
/// Every observation is appended to the score history. The first one always
/// counts as an improvement; afterwards only a strictly better validation
/// score (per `mode`) does. Each improvement persists a checkpoint through the
/// sink and resets the counter, every other observation increments it. Once
/// the counter reaches `patience` the policy is stopped for good.
pub struct EarlyStopping<S: CheckpointSink> {
    patience: usize,
    mode: StopMode,
    best_score: Option<f64>,
    best_epoch: Option<usize>,
    counter: usize,
    stopped: bool,
    history: ScoreHistory,
    sink: S,
}

/// Collects the policy's settings; the mode has no default.
pub struct EarlyStoppingBuilder<S: CheckpointSink> {
    patience: usize,
    mode: Option<StopMode>,
    sink: S,
}

impl<S: CheckpointSink> EarlyStoppingBuilder<S> {
    pub fn patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn mode(mut self, mode: StopMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn build(self) -> Result<EarlyStopping<S>> {
        let mode = self.mode
            .ok_or_else(|| Error::config("early stopping mode must be set before training"))?;
        if self.patience == 0 {
            return Err(Error::config("patience must be at least 1"));
        }
        Ok(EarlyStopping {
            patience: self.patience,
            mode,
            best_score: None,
            best_epoch: None,
            counter: 0,
            stopped: false,
            history: ScoreHistory::default(),
            sink: self.sink,
        })
    }
}

impl<S: CheckpointSink> EarlyStopping<S> {
    pub const DEFAULT_PATIENCE: usize = 15;

    pub fn builder(sink: S) -> EarlyStoppingBuilder<S> {
        EarlyStoppingBuilder {
            patience: Self::DEFAULT_PATIENCE,
            mode: None,
            sink,
        }
    }

    /// Records one epoch's scores and returns whether training must stop.
    ///
    /// A failed checkpoint write is returned as an error and leaves the best
    /// score and counter untouched.
    pub fn observe(&mut self, train_score: f64, val_score: f64, model: &Model) -> Result<bool> {
        self.history.push(train_score, val_score);
        let epoch = self.history.len();

        if self.stopped {
            return Ok(true);
        }

        let improved = match self.best_score {
            None => true,
            Some(best) => self.mode.is_improvement(val_score, best),
        };

        if improved {
            self.sink.persist(model, &Improvement { epoch, score: val_score, mode: self.mode })?;
            debug!(epoch, score = val_score, previous = ?self.best_score, "validation score improved");
            self.best_score = Some(val_score);
            self.best_epoch = Some(epoch);
            self.counter = 0;
        } else {
            self.counter += 1;
        }

        if self.counter >= self.patience {
            self.stopped = true;
            warn!(
                epoch,
                patience = self.patience,
                best = ?self.best_score,
                "early stopping: no improvement for {} epochs", self.patience
            );
        }

        Ok(self.stopped)
    }

    pub fn mode(&self) -> StopMode {
        self.mode
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    /// 1-based epoch of the current best score.
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn history(&self) -> &ScoreHistory {
        &self.history
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::spec::ArchitectureSpec;
    use crate::task::Task;
    use crate::train::checkpoint::MemoryCheckpoint;

    fn model() -> Model {
        let spec = ArchitectureSpec { hidden: vec![2], ..Default::default() };
        Model::new(Task::Regression, 1, &spec).unwrap()
    }

    fn policy(patience: usize, mode: StopMode) -> EarlyStopping<MemoryCheckpoint> {
        EarlyStopping::builder(MemoryCheckpoint::default())
            .patience(patience)
            .mode(mode)
            .build()
            .unwrap()
    }

    fn feed(es: &mut EarlyStopping<MemoryCheckpoint>, scores: &[f64]) -> Vec<bool> {
        let m = model();
        scores.iter().map(|&s| es.observe(s, s, &m).unwrap()).collect()
    }

    #[test]
    fn test_mode_is_required() {
        let res = EarlyStopping::builder(MemoryCheckpoint::default()).patience(3).build();
        assert!(matches!(res, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_zero_patience_is_rejected() {
        let res = EarlyStopping::builder(MemoryCheckpoint::default())
            .patience(0)
            .mode(StopMode::Min)
            .build();
        assert!(matches!(res, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_first_observation_sets_best_and_checkpoints() {
        for mode in [StopMode::Min, StopMode::Max] {
            let mut es = policy(1, mode);
            assert_eq!(feed(&mut es, &[42.0]), vec![false]);
            assert_eq!(es.best_score(), Some(42.0));
            assert_eq!(es.best_epoch(), Some(1));
            assert_eq!(es.sink().writes(), 1);
        }
    }

    #[test]
    fn test_min_mode_loss_sequence() {
        let mut es = policy(2, StopMode::Min);
        let stops = feed(&mut es, &[1.0, 0.9, 0.95, 0.96]);
        assert_eq!(stops, vec![false, false, false, true]);
        assert_eq!(es.best_score(), Some(0.9));
        assert_eq!(es.counter(), 2);
        assert!(es.is_stopped());
        assert_eq!(es.sink().writes(), 2);
    }

    #[test]
    fn test_max_mode_accuracy_sequence() {
        let mut es = policy(3, StopMode::Max);
        let stops = feed(&mut es, &[70.0, 75.0, 74.0, 74.0, 74.0]);
        assert_eq!(stops, vec![false, false, false, false, true]);
        assert_eq!(es.best_score(), Some(75.0));
        assert_eq!(es.best_epoch(), Some(2));
    }

    #[test]
    fn test_strictly_decreasing_never_counts() {
        let mut es = policy(1, StopMode::Min);
        let m = model();
        for i in 0..20 {
            assert!(!es.observe(0.0, 10.0 - i as f64, &m).unwrap());
            assert_eq!(es.counter(), 0);
        }
        assert_eq!(es.sink().writes(), 20);
    }

    #[test]
    fn test_constant_and_increasing_count_every_call() {
        for scores in [[1.0; 6], [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]] {
            let mut es = policy(10, StopMode::Min);
            let m = model();
            es.observe(0.0, scores[0], &m).unwrap();
            for (i, &s) in scores[1..].iter().enumerate() {
                es.observe(0.0, s, &m).unwrap();
                assert_eq!(es.counter(), i + 1);
            }
        }
    }

    #[test]
    fn test_stops_exactly_when_counter_reaches_patience() {
        for p in 1..6 {
            let mut es = policy(p, StopMode::Max);
            let m = model();
            es.observe(0.0, 50.0, &m).unwrap();
            for call in 1..=p {
                let stop = es.observe(0.0, 50.0, &m).unwrap();
                assert_eq!(stop, call == p, "patience {p}, call {call}");
            }
        }
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut es = policy(3, StopMode::Min);
        feed(&mut es, &[1.0, 1.5, 1.2]);
        assert_eq!(es.counter(), 2);
        feed(&mut es, &[0.5]);
        assert_eq!(es.counter(), 0);
        assert_eq!(es.best_score(), Some(0.5));
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut es = policy(1, StopMode::Min);
        assert_eq!(feed(&mut es, &[1.0, 2.0, 0.1]), vec![false, true, true]);
        assert_eq!(es.best_score(), Some(1.0));
        assert_eq!(es.sink().writes(), 1);
        assert_eq!(es.history().len(), 3);
    }

    #[test]
    fn test_history_records_both_series() {
        let mut es = policy(5, StopMode::Max);
        let m = model();
        es.observe(60.0, 55.0, &m).unwrap();
        es.observe(65.0, 50.0, &m).unwrap();
        assert_eq!(es.history().train(), &[60.0, 65.0]);
        assert_eq!(es.history().validation(), &[55.0, 50.0]);
    }

    /// Succeeds `ok_writes` times, then fails every write.
    struct FailingSink {
        ok_writes: usize,
        calls: usize,
    }

    impl CheckpointSink for FailingSink {
        fn persist(&mut self, _model: &Model, _improvement: &Improvement) -> Result<()> {
            self.calls += 1;
            if self.calls > self.ok_writes {
                return Err(Error::Checkpoint {
                    path: "nets/regression-net.json".into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_leaves_best_and_counter() {
        let mut es = EarlyStopping::builder(FailingSink { ok_writes: 1, calls: 0 })
            .patience(3)
            .mode(StopMode::Min)
            .build()
            .unwrap();
        let m = model();
        assert!(!es.observe(1.0, 1.0, &m).unwrap());
        assert!(!es.observe(1.1, 1.2, &m).unwrap());
        assert_eq!(es.counter(), 1);

        let err = es.observe(0.7, 0.5, &m).unwrap_err();
        assert!(matches!(err, Error::Checkpoint { .. }));
        assert_eq!(es.best_score(), Some(1.0));
        assert_eq!(es.best_epoch(), Some(1));
        assert_eq!(es.counter(), 1);
        assert!(!es.is_stopped());
        assert_eq!(es.history().validation(), &[1.0, 1.2, 0.5]);
        assert_eq!(es.history().train(), &[1.0, 1.1, 0.7]);
        assert_eq!(es.sink().calls, 2);
    }

    #[test]
    fn test_first_observation_sink_failure_sets_no_best() {
        let mut es = EarlyStopping::builder(FailingSink { ok_writes: 0, calls: 0 })
            .mode(StopMode::Max)
            .build()
            .unwrap();
        assert!(es.observe(50.0, 40.0, &model()).is_err());
        assert_eq!(es.best_score(), None);
        assert_eq!(es.best_epoch(), None);
        assert_eq!(es.counter(), 0);
        assert_eq!(es.history().len(), 1);
    }
}
