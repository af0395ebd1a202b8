use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::dense::Layer;
use crate::network::network::Network;
use crate::task::Task;

/// Builds the layer stack for a given input dimensionality and task.
pub trait ArchitectureBuilder {
    fn build(&self, input_dim: usize, task: Task) -> Result<Network>;
}

/// A tapering stack of hidden layers followed by a linear head sized by the
/// task.
///
/// Fields:
/// - `hidden`: hidden layer widths, input side first
/// - `dropout`: drop probability after every hidden layer except the first
/// - `activation`: nonlinearity after every hidden layer
/// - `init_std`: standard deviation of the normal weight initialiser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureSpec {
    pub hidden: Vec<usize>,
    pub dropout: f64,
    pub activation: ActivationFunction,
    pub init_std: f64,
}

impl Default for ArchitectureSpec {
    fn default() -> Self {
        ArchitectureSpec {
            hidden: vec![64, 64, 32, 16, 8],
            dropout: 0.2,
            activation: ActivationFunction::ReLU,
            init_std: 1.0,
        }
    }
}

impl ArchitectureSpec {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::config(format!("dropout must be in [0, 1), got {}", self.dropout)));
        }
        if !(self.init_std.is_finite() && self.init_std > 0.0) {
            return Err(Error::config(format!("init_std must be positive, got {}", self.init_std)));
        }
        if self.hidden.iter().any(|&w| w == 0) {
            return Err(Error::config("hidden layer widths must be non-zero"));
        }
        Ok(())
    }

    pub fn build_with_rng<R: Rng + ?Sized>(&self, input_dim: usize, task: Task, rng: &mut R) -> Result<Network> {
        self.validate()?;
        if input_dim == 0 {
            return Err(Error::config("input dimensionality must be non-zero"));
        }

        let mut layers = Vec::with_capacity(self.hidden.len() + 1);
        let mut fan_in = input_dim;
        for (i, &width) in self.hidden.iter().enumerate() {
            let dropout = if i > 0 { self.dropout } else { 0.0 };
            layers.push(Layer::new(width, fan_in, self.activation, dropout, self.init_std, rng));
            fan_in = width;
        }
        layers.push(Layer::new(
            task.output_width(),
            fan_in,
            ActivationFunction::Identity,
            0.0,
            self.init_std,
            rng,
        ));

        Ok(Network::new(layers))
    }
}

impl ArchitectureBuilder for ArchitectureSpec {
    fn build(&self, input_dim: usize, task: Task) -> Result<Network> {
        self.build_with_rng(input_dim, task, &mut rand::thread_rng())
    }
}
