use crate::{math::matrix::Matrix, layers::dense::Layer, optim::optimizer::Optimizer};

pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, layers: &mut [Layer], grads: &[(Matrix, Matrix)]) {
        for (layer, (w_grad, b_grad)) in layers.iter_mut().zip(grads) {
            layer.apply_gradients(w_grad, b_grad, self.learning_rate);
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
