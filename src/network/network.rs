use serde::{Serialize, Deserialize};

use crate::{layers::dense::Layer, math::matrix::Matrix};

/// An ordered stack of dense layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
}

impl Network {
    pub fn new(layers: Vec<Layer>) -> Network {
        Network { layers }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, Layer::input_size)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.size)
    }

    /// Forward pass; stores activations in each layer for backprop.
    pub fn forward(&mut self, input: &[f64], training: bool) -> Vec<f64> {
        let mut current = input.to_vec();
        for layer in &mut self.layers {
            current = layer.feed_from(&current, training);
        }
        current
    }

    /// Back-propagates `output_grad` (∂L/∂output) through the activations
    /// cached by the last `forward` call on `input`. Returns one
    /// `(weights_grad, biases_grad)` pair per layer, in layer order.
    pub fn backward(&self, input: &[f64], output_grad: Vec<f64>) -> Vec<(Matrix, Matrix)> {
        let mut grads = vec![(Matrix::default(), Matrix::default()); self.layers.len()];
        let mut delta = Matrix::row(&output_grad);

        for i in (0..self.layers.len()).rev() {
            let input_for_layer = if i == 0 {
                Matrix::row(input)
            } else {
                self.layers[i - 1].neurons.clone()
            };

            let (w_grad, b_grad) = self.layers[i].compute_gradients(&delta, &input_for_layer);

            if i > 0 {
                // Propagate δ_i through weights to get ∂L/∂a_{i-1}
                delta = &b_grad * &self.layers[i].weights.transpose();
            }

            grads[i] = (w_grad, b_grad);
        }

        grads
    }

    /// Zeroed gradient accumulators shaped like this network's parameters.
    pub fn zero_grads(&self) -> Vec<(Matrix, Matrix)> {
        self.layers.iter()
            .map(|layer| (
                Matrix::zeros(layer.weights.rows, layer.weights.cols),
                Matrix::zeros(layer.biases.rows, layer.biases.cols),
            ))
            .collect()
    }

    pub(crate) fn reset_caches(&mut self) {
        for layer in &mut self.layers {
            layer.reset_caches();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_net() -> Network {
        let mut rng = StdRng::seed_from_u64(3);
        Network::new(vec![
            Layer::new(3, 2, ActivationFunction::Tanh, 0.0, 0.5, &mut rng),
            Layer::new(1, 3, ActivationFunction::Identity, 0.0, 0.5, &mut rng),
        ])
    }

    #[test]
    fn test_backward_matches_finite_differences() {
        let mut net = small_net();
        let input = [0.4, -0.7];
        let target = 0.25;
        let loss = |net: &mut Network| {
            let out = net.forward(&input, false);
            (out[0] - target).powi(2)
        };

        let out = net.forward(&input, false);
        let grads = net.backward(&input, vec![2.0 * (out[0] - target)]);

        let h = 1e-6;
        for (li, (w_grad, _)) in grads.iter().enumerate() {
            for r in 0..w_grad.rows {
                for c in 0..w_grad.cols {
                    let orig = net.layers[li].weights.data[r][c];
                    net.layers[li].weights.data[r][c] = orig + h;
                    let up = loss(&mut net);
                    net.layers[li].weights.data[r][c] = orig - h;
                    let down = loss(&mut net);
                    net.layers[li].weights.data[r][c] = orig;
                    let numeric = (up - down) / (2.0 * h);
                    assert!(
                        (numeric - w_grad.data[r][c]).abs() < 1e-5,
                        "layer {li} w[{r}][{c}]: numeric {numeric} vs analytic {}",
                        w_grad.data[r][c]
                    );
                }
            }
        }
    }
}
