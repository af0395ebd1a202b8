use std::num::NonZeroUsize;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::{Error, Result};

/// One feature vector and its label.
///
/// Regression labels are arbitrary reals; classification labels are class
/// indices stored as whole-valued reals.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub features: Vec<f64>,
    pub label: f64,
}

impl Sample {
    pub fn new(features: Vec<f64>, label: f64) -> Sample {
        Sample { features, label }
    }
}

/// How a view orders its samples when batched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOrder {
    /// Fresh random order on every pass (training).
    Shuffled,
    /// Storage order on every pass (validation, test).
    Fixed,
}

/// An ordered, batchable sequence of samples.
#[derive(Debug, Clone)]
pub struct DatasetView {
    samples: Vec<Sample>,
    order: ViewOrder,
}

impl DatasetView {
    pub fn new(samples: Vec<Sample>, order: ViewOrder) -> DatasetView {
        DatasetView { samples, order }
    }

    pub fn shuffled(samples: Vec<Sample>) -> DatasetView {
        DatasetView::new(samples, ViewOrder::Shuffled)
    }

    pub fn fixed(samples: Vec<Sample>) -> DatasetView {
        DatasetView::new(samples, ViewOrder::Fixed)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn order(&self) -> ViewOrder {
        self.order
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Splits the view into batches of `batch_size`; the last one may be
    /// shorter.
    pub fn batches(&self, batch_size: NonZeroUsize) -> Batches<'_> {
        self.batches_with_rng(batch_size, &mut rand::thread_rng())
    }

    pub fn batches_with_rng<R: Rng + ?Sized>(&self, batch_size: NonZeroUsize, rng: &mut R) -> Batches<'_> {
        let mut indices: Vec<usize> = (0..self.samples.len()).collect();
        if self.order == ViewOrder::Shuffled {
            indices.shuffle(rng);
        }
        Batches { view: self, indices, batch_size: batch_size.get(), cursor: 0 }
    }
}

/// Iterator over the batches of one pass.
pub struct Batches<'a> {
    view: &'a DatasetView,
    indices: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Vec<&'a Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.indices.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.indices.len());
        let batch = self.indices[self.cursor..end]
            .iter()
            .map(|&i| &self.view.samples[i])
            .collect();
        self.cursor = end;
        Some(batch)
    }
}

/// Output of a feature provider: numeric train and test portions.
#[derive(Debug, Clone, Default)]
pub struct PreparedData {
    pub train_features: Vec<Vec<f64>>,
    pub test_features: Vec<Vec<f64>>,
    pub train_labels: Vec<f64>,
    pub test_labels: Vec<f64>,
    /// Names of the encoded feature columns, in feature-vector order.
    pub feature_names: Vec<String>,
}

impl PreparedData {
    /// Width of every feature vector; errors on mismatched row counts or
    /// ragged feature vectors.
    pub fn input_dim(&self) -> Result<usize> {
        if self.train_features.len() != self.train_labels.len() {
            return Err(Error::data(format!(
                "{} train feature rows but {} train labels",
                self.train_features.len(),
                self.train_labels.len()
            )));
        }
        if self.test_features.len() != self.test_labels.len() {
            return Err(Error::data(format!(
                "{} test feature rows but {} test labels",
                self.test_features.len(),
                self.test_labels.len()
            )));
        }
        let dim = self.train_features.first().map_or(0, Vec::len);
        let ragged = self.train_features.iter()
            .chain(self.test_features.iter())
            .position(|row| row.len() != dim);
        if let Some(row) = ragged {
            return Err(Error::data(format!("row {row} does not have {dim} features")));
        }
        Ok(dim)
    }
}

/// The three disjoint views a trainer works with.
#[derive(Debug, Clone)]
pub struct Partition {
    pub train: DatasetView,
    pub validation: DatasetView,
    pub test: DatasetView,
}

/// Carves a validation subset out of the training portion.
#[derive(Debug, Clone, Copy)]
pub struct DatasetPartitioner {
    val_split: f64,
}

impl DatasetPartitioner {
    /// `val_split` is the held-out fraction and must lie in (0, 1).
    pub fn new(val_split: f64) -> Result<DatasetPartitioner> {
        if !(val_split > 0.0 && val_split < 1.0) {
            return Err(Error::config(format!("val_split must be in (0, 1), got {val_split}")));
        }
        Ok(DatasetPartitioner { val_split })
    }

    pub fn val_split(&self) -> f64 {
        self.val_split
    }

    /// Rows kept for training out of `n`: ⌊n·(1 − v)⌋.
    pub fn train_size(&self, n: usize) -> usize {
        (n as f64 * (1.0 - self.val_split)).floor() as usize
    }

    pub fn split(&self, data: PreparedData) -> Result<Partition> {
        self.split_with_rng(data, &mut rand::thread_rng())
    }

    pub fn split_with_rng<R: Rng + ?Sized>(&self, data: PreparedData, rng: &mut R) -> Result<Partition> {
        data.input_dim()?;

        let train: Vec<Sample> = data.train_features.into_iter()
            .zip(data.train_labels)
            .map(|(f, l)| Sample::new(f, l))
            .collect();
        let test: Vec<Sample> = data.test_features.into_iter()
            .zip(data.test_labels)
            .map(|(f, l)| Sample::new(f, l))
            .collect();

        let (train, validation) = self.split_samples(train, rng)?;
        debug!(
            train = train.len(),
            validation = validation.len(),
            test = test.len(),
            "partitioned dataset"
        );

        Ok(Partition {
            train: DatasetView::shuffled(train),
            validation: DatasetView::fixed(validation),
            test: DatasetView::fixed(test),
        })
    }

    /// Randomly assigns samples to (training, validation).
    pub fn split_samples<R: Rng + ?Sized>(
        &self,
        mut samples: Vec<Sample>,
        rng: &mut R,
    ) -> Result<(Vec<Sample>, Vec<Sample>)> {
        let n_train = self.train_size(samples.len());
        if n_train == 0 {
            return Err(Error::config(format!(
                "val_split {} leaves no training rows out of {}",
                self.val_split,
                samples.len()
            )));
        }
        samples.shuffle(rng);
        let validation = samples.split_off(n_train);
        Ok((samples, validation))
    }
}
