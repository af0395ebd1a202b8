use serde::{Serialize, Deserialize};

use crate::layers::dense::Layer;
use crate::math::matrix::Matrix;
use crate::optim::{adam::Adam, sgd::Sgd};

/// Applies one parameter update per batch, given the batch-averaged
/// `(weights_grad, biases_grad)` of every layer in network order.
pub trait Optimizer {
    fn step(&mut self, layers: &mut [Layer], grads: &[(Matrix, Matrix)]);

    fn learning_rate(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

impl OptimizerKind {
    pub fn build(self, learning_rate: f64) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Adam => Box::new(Adam::new(learning_rate)),
            OptimizerKind::Sgd => Box::new(Sgd::new(learning_rate)),
        }
    }
}
