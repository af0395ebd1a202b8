pub mod dataset;
pub mod provider;
pub mod table;

pub use dataset::{Batches, DatasetPartitioner, DatasetView, Partition, PreparedData, Sample, ViewOrder};
pub use provider::{FeatureProvider, TabularFeatureProvider};
pub use table::Table;
