pub mod optimizer;
pub mod sgd;
pub mod adam;

pub use optimizer::{Optimizer, OptimizerKind};
pub use sgd::Sgd;
pub use adam::Adam;
