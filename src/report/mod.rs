pub mod score_report;

pub use score_report::{JsonReporter, ScoreReport, ScoreReporter, TextReporter};
