use crate::error::{Error, Result};
use crate::network::network::Network;
use crate::network::spec::ArchitectureBuilder;
use crate::task::Task;

/// A regressor or classifier: one shared layer-stack topology whose head
/// width and loss follow the task.
#[derive(Debug, Clone)]
pub struct Model {
    task: Task,
    network: Network,
}

impl Model {
    pub fn new(task: Task, input_dim: usize, builder: &dyn ArchitectureBuilder) -> Result<Model> {
        let network = builder.build(input_dim, task)?;
        Model::from_network(task, network)
    }

    /// Wraps an already built network, checking its head matches the task.
    pub fn from_network(task: Task, network: Network) -> Result<Model> {
        if network.layers.is_empty() {
            return Err(Error::config("network has no layers"));
        }
        if network.output_size() != task.output_width() {
            return Err(Error::config(format!(
                "{task} expects an output width of {}, network produces {}",
                task.output_width(),
                network.output_size()
            )));
        }
        Ok(Model { task, network })
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn input_dim(&self) -> usize {
        self.network.input_size()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    /// Raw outputs: one value for regression, one score per class otherwise.
    pub fn forward(&mut self, input: &[f64], training: bool) -> Vec<f64> {
        self.network.forward(input, training)
    }

    /// Arg-max class for classifiers, the regression value otherwise.
    pub fn predict(&mut self, input: &[f64]) -> f64 {
        let out = self.forward(input, false);
        match self.task {
            Task::Regression => out[0],
            Task::Classification { .. } => crate::task::argmax(&out) as f64,
        }
    }
}
