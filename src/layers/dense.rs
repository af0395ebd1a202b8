use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// Fully connected layer: `a = dropout(σ(x·W + b))`.
///
/// The activation caches (`neurons`, `pre_neurons`, `mask`) hold the values
/// of the most recent forward pass and are what back-propagation reads. They
/// are not part of the persisted parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub size: usize,
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction,
    /// Drop probability applied after the activation; `0.0` disables dropout.
    #[serde(default)]
    pub dropout: f64,
    #[serde(skip)]
    pub neurons: Matrix,
    #[serde(skip)]
    pre_neurons: Matrix, // z = xW + b, needed for σ'(z)
    #[serde(skip)]
    mask: Matrix,
}

impl Layer {
    /// Weights drawn from N(0, init_std²), biases zero.
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        dropout: f64,
        init_std: f64,
        rng: &mut R,
    ) -> Layer {
        Layer {
            size,
            weights: Matrix::normal(input_size, size, init_std, rng),
            biases: Matrix::zeros(1, size),
            activator: activation,
            dropout,
            neurons: Matrix::zeros(1, size),
            pre_neurons: Matrix::zeros(1, size),
            mask: Matrix::filled(1, size, 1.0),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    /// Forward pass for one sample. Dropout is only sampled when `training`
    /// is set; surviving units are scaled by `1 / (1 - p)` so evaluation needs
    /// no rescaling.
    pub fn feed_from(&mut self, input: &[f64], training: bool) -> Vec<f64> {
        let z = &Matrix::row(input) * &self.weights + self.biases.clone();
        let a = z.map(|x| self.activator.function(x));

        self.mask = if training && self.dropout > 0.0 {
            let keep = 1.0 - self.dropout;
            let mut rng = rand::thread_rng();
            Matrix::from_data(vec![
                (0..self.size)
                    .map(|_| if rng.gen::<f64>() < keep { 1.0 / keep } else { 0.0 })
                    .collect(),
            ])
        } else {
            Matrix::filled(1, self.size, 1.0)
        };

        let out = a.hadamard(&self.mask);
        self.pre_neurons = z;
        self.neurons = out.clone();
        out.data[0].clone()
    }

    /// Computes gradient adjustments. Returns (weights_grad, biases_grad).
    /// `next_layer_delta` is ∂L/∂a for this layer's (post-dropout) output.
    pub fn compute_gradients(
        &self,
        next_layer_delta: &Matrix,
        inputs: &Matrix,
    ) -> (Matrix, Matrix) {
        let act_derivative = self.pre_neurons.map(|x| self.activator.derivative(x));
        // δ = error ⊙ mask ⊙ σ'(z)
        let layer_delta = next_layer_delta.hadamard(&self.mask).hadamard(&act_derivative);

        let weights_adjustment = &inputs.transpose() * &layer_delta;

        (weights_adjustment, layer_delta)
    }

    /// Applies pre-computed update directions scaled by lr.
    pub fn apply_gradients(&mut self, weights_grad: &Matrix, biases_grad: &Matrix, lr: f64) {
        self.weights.sub_scaled(weights_grad, lr);
        self.biases.sub_scaled(biases_grad, lr);
    }

    /// Restores the activation caches after deserialisation.
    pub(crate) fn reset_caches(&mut self) {
        self.neurons = Matrix::zeros(1, self.size);
        self.pre_neurons = Matrix::zeros(1, self.size);
        self.mask = Matrix::filled(1, self.size, 1.0);
    }
}
