use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::dataset::PreparedData;
use crate::data::table::Table;
use crate::error::{Error, Result};
use crate::task::Task;

/// Turns a raw table into numeric train/test features and labels.
pub trait FeatureProvider {
    fn prepare(&self, table: &Table, columns: &[String], task: Task) -> Result<PreparedData>;
}

/// Default provider for knowledge-base exports.
///
/// Numeric columns pass through (optionally standardised with the training
/// portion's mean and deviation), every other column is one-hot encoded over
/// its sorted distinct values. Rows are shuffled and `test_split` of them
/// are set aside as the test portion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularFeatureProvider {
    pub target: String,
    pub test_split: f64,
    pub standardize: bool,
}

impl TabularFeatureProvider {
    pub fn new(target: impl Into<String>) -> Self {
        TabularFeatureProvider {
            target: target.into(),
            test_split: 0.2,
            standardize: true,
        }
    }

    pub fn prepare_with_rng<R: Rng + ?Sized>(
        &self,
        table: &Table,
        columns: &[String],
        task: Task,
        rng: &mut R,
    ) -> Result<PreparedData> {
        if !(self.test_split > 0.0 && self.test_split < 1.0) {
            return Err(Error::config(format!(
                "test_split must be in (0, 1), got {}",
                self.test_split
            )));
        }
        if columns.is_empty() {
            return Err(Error::config("at least one feature column is required"));
        }
        if columns.iter().any(|c| *c == self.target) {
            return Err(Error::config(format!(
                "target column '{}' cannot also be a feature",
                self.target
            )));
        }

        let labels = encode_target(&table.column(&self.target)?, task)?;

        let mut feature_names = Vec::new();
        let mut numeric = Vec::new();
        let mut encoded: Vec<Vec<f64>> = vec![Vec::new(); table.len()];
        for name in columns {
            let cells = table.column(name)?;
            let block = encode_column(name, &cells)?;
            numeric.extend(std::iter::repeat(block.is_numeric).take(block.names.len()));
            feature_names.extend(block.names);
            for (row, values) in encoded.iter_mut().zip(block.rows) {
                row.extend(values);
            }
        }

        let mut indices: Vec<usize> = (0..table.len()).collect();
        indices.shuffle(rng);
        let n_test = (table.len() as f64 * self.test_split).floor() as usize;
        if n_test == table.len() {
            return Err(Error::config("test_split leaves no training rows"));
        }
        let (test_idx, train_idx) = indices.split_at(n_test);

        let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<f64>) {
            idx.iter().map(|&i| (encoded[i].clone(), labels[i])).unzip()
        };
        let (mut train_features, train_labels) = pick(train_idx);
        let (mut test_features, test_labels) = pick(test_idx);

        if self.standardize {
            // One-hot indicators stay in {0, 1}.
            let stats = column_stats(&train_features);
            for row in train_features.iter_mut().chain(test_features.iter_mut()) {
                for ((x, (mean, std)), _) in row.iter_mut().zip(&stats).zip(&numeric).filter(|(_, n)| **n) {
                    *x = (*x - mean) / std;
                }
            }
        }

        debug!(
            features = feature_names.len(),
            train = train_features.len(),
            test = test_features.len(),
            "prepared features"
        );

        Ok(PreparedData {
            train_features,
            test_features,
            train_labels,
            test_labels,
            feature_names,
        })
    }
}

impl FeatureProvider for TabularFeatureProvider {
    fn prepare(&self, table: &Table, columns: &[String], task: Task) -> Result<PreparedData> {
        self.prepare_with_rng(table, columns, task, &mut rand::thread_rng())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

struct EncodedColumn {
    names: Vec<String>,
    rows: Vec<Vec<f64>>,
    is_numeric: bool,
}

fn encode_column(name: &str, cells: &[&str]) -> Result<EncodedColumn> {
    let numeric: Option<Vec<f64>> = cells.iter().map(|c| c.parse::<f64>().ok()).collect();
    if let Some(values) = numeric {
        if let Some(row) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::data(format!(
                "Row {}: column '{name}' holds non-finite value '{}'",
                row + 1,
                cells[row]
            )));
        }
        return Ok(EncodedColumn {
            names: vec![name.to_string()],
            rows: values.into_iter().map(|v| vec![v]).collect(),
            is_numeric: true,
        });
    }

    let categories: Vec<&str> = cells.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    Ok(EncodedColumn {
        names: categories.iter().map(|c| format!("{name}={c}")).collect(),
        rows: cells.iter()
            .map(|cell| categories.iter().map(|c| if c == cell { 1.0 } else { 0.0 }).collect())
            .collect(),
        is_numeric: false,
    })
}

fn encode_target(cells: &[&str], task: Task) -> Result<Vec<f64>> {
    match task {
        Task::Regression => cells.iter()
            .enumerate()
            .map(|(row, c)| {
                c.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| Error::data(format!("Row {}: target '{c}' is not a finite number", row + 1)))
            })
            .collect(),
        Task::Classification { num_classes } => {
            let indices: Option<Vec<f64>> = cells.iter()
                .map(|c| c.parse::<usize>().ok().map(|i| i as f64))
                .collect();
            let labels = match indices {
                Some(labels) => labels,
                None => {
                    let classes: Vec<&str> = cells.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
                    if classes.len() > num_classes {
                        return Err(Error::data(format!(
                            "target has {} distinct classes but num_classes = {num_classes}",
                            classes.len()
                        )));
                    }
                    cells.iter()
                        .map(|c| classes.iter().position(|k| k == c).unwrap_or(0) as f64)
                        .collect()
                }
            };
            for label in &labels {
                task.validate_label(*label)?;
            }
            Ok(labels)
        }
    }
}

/// Per-column (mean, std); a zero deviation is replaced by 1.
fn column_stats(rows: &[Vec<f64>]) -> Vec<(f64, f64)> {
    let n = rows.len() as f64;
    let width = rows.first().map_or(0, Vec::len);
    (0..width)
        .map(|j| {
            let mean = rows.iter().map(|r| r[j]).sum::<f64>() / n;
            let var = rows.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            (mean, if std > 0.0 { std } else { 1.0 })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn movies() -> Table {
        Table::parse(
            b"id,genre,budget,quality,score\n\
              1,Drama,10,good,7.5\n\
              2,Comedy,20,bad,5.0\n\
              3,Drama,30,good,8.0\n\
              4,Horror,40,average,6.1\n\
              5,Comedy,50,bad,4.2\n",
        )
        .unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_hot_encodes_categorical_columns() {
        let provider = TabularFeatureProvider { standardize: false, ..TabularFeatureProvider::new("score") };
        let data = provider
            .prepare_with_rng(&movies(), &cols(&["genre", "budget"]), Task::Regression, &mut StdRng::seed_from_u64(2))
            .unwrap();
        assert_eq!(data.feature_names, vec!["genre=Comedy", "genre=Drama", "genre=Horror", "budget"]);
        assert_eq!(data.train_features.len() + data.test_features.len(), 5);
        assert_eq!(data.test_features.len(), 1);
        for (row, label) in data.train_features.iter().zip(&data.train_labels) {
            assert_eq!(row[..3].iter().sum::<f64>(), 1.0);
            assert!([7.5, 5.0, 8.0, 6.1, 4.2].contains(label));
        }
    }

    #[test]
    fn test_string_classes_map_to_sorted_indices() {
        let provider = TabularFeatureProvider::new("quality");
        let data = provider
            .prepare_with_rng(
                &movies(),
                &cols(&["budget"]),
                Task::Classification { num_classes: 3 },
                &mut StdRng::seed_from_u64(4),
            )
            .unwrap();
        // average = 0, bad = 1, good = 2
        let all: Vec<f64> = data.train_labels.iter().chain(&data.test_labels).copied().collect();
        let mut sorted = all.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sorted, vec![0.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_too_many_classes_is_data_error() {
        let provider = TabularFeatureProvider::new("genre");
        let err = provider
            .prepare(&movies(), &cols(&["budget"]), Task::Classification { num_classes: 2 })
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_standardized_train_columns_are_centred() {
        let provider = TabularFeatureProvider { test_split: 0.2, ..TabularFeatureProvider::new("score") };
        let data = provider
            .prepare_with_rng(&movies(), &cols(&["budget", "id"]), Task::Regression, &mut StdRng::seed_from_u64(8))
            .unwrap();
        for j in 0..2 {
            let mean: f64 = data.train_features.iter().map(|r| r[j]).sum::<f64>() / data.train_features.len() as f64;
            assert!(mean.abs() < 1e-12);
        }
    }

    #[test]
    fn test_target_cannot_be_feature() {
        let provider = TabularFeatureProvider::new("score");
        let err = provider.prepare(&movies(), &cols(&["score"]), Task::Regression).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_non_numeric_regression_target() {
        let provider = TabularFeatureProvider::new("genre");
        let err = provider.prepare(&movies(), &cols(&["budget"]), Task::Regression).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_standardize_leaves_one_hot_cells_alone() {
        let data = TabularFeatureProvider::new("score")
            .prepare_with_rng(&movies(), &cols(&["genre", "budget"]), Task::Regression, &mut StdRng::seed_from_u64(2))
            .unwrap();
        for row in data.train_features.iter().chain(&data.test_features) {
            for &cell in &row[..3] {
                assert!(cell == 0.0 || cell == 1.0, "one-hot cell = {cell}");
            }
            assert_eq!(row[..3].iter().sum::<f64>(), 1.0);
        }
        let n = data.train_features.len() as f64;
        let budget_mean = data.train_features.iter().map(|r| r[3]).sum::<f64>() / n;
        assert!(budget_mean.abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_feature_is_data_error() {
        for bad in ["NaN", "inf", "-infinity"] {
            let table = Table::parse(format!("budget,score\n10,1.0\n{bad},2.0\n30,3.0\n").as_bytes()).unwrap();
            let err = TabularFeatureProvider::new("score")
                .prepare(&table, &cols(&["budget"]), Task::Regression)
                .unwrap_err();
            assert!(matches!(err, Error::Data(_)), "{bad}: {err:?}");
        }
    }

    #[test]
    fn test_non_finite_regression_target_is_data_error() {
        let table = Table::parse(b"budget,score\n10,1.0\n20,NaN\n30,3.0\n").unwrap();
        let err = TabularFeatureProvider::new("score")
            .prepare(&table, &cols(&["budget"]), Task::Regression)
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }
}
