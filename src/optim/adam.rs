use crate::{math::matrix::Matrix, layers::dense::Layer, optim::optimizer::Optimizer};

/// Adam optimizer with bias-corrected moment estimates.
///
/// θ_t = θ_{t-1} - lr_t · m_t / (√v_t + ε),  lr_t = lr · √(1 - β₂ᵗ) / (1 - β₁ᵗ)
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: u64,
    // (weights, biases) moments per layer, created on the first step
    m: Vec<(Matrix, Matrix)>,
    v: Vec<(Matrix, Matrix)>,
}

impl Adam {
    pub fn new(lr: f64) -> Self {
        Self::with_params(lr, 0.9, 0.999, 1e-8)
    }

    pub fn with_params(lr: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self { lr, beta1, beta2, epsilon, t: 0, m: Vec::new(), v: Vec::new() }
    }

    pub fn step_count(&self) -> u64 {
        self.t
    }

    fn ensure_moments(&mut self, grads: &[(Matrix, Matrix)]) {
        if self.m.len() != grads.len() {
            let zeros = |(w, b): &(Matrix, Matrix)| {
                (Matrix::zeros(w.rows, w.cols), Matrix::zeros(b.rows, b.cols))
            };
            self.m = grads.iter().map(zeros).collect();
            self.v = grads.iter().map(zeros).collect();
        }
    }

    fn direction(&self, m: &mut Matrix, v: &mut Matrix, grad: &Matrix) -> Matrix {
        let (b1, b2) = (self.beta1, self.beta2);
        *m = m.zip_map(grad, |m, g| b1 * m + (1.0 - b1) * g);
        *v = v.zip_map(grad, |v, g| b2 * v + (1.0 - b2) * g * g);
        let eps = self.epsilon;
        m.zip_map(v, |m, v| m / (v.sqrt() + eps))
    }
}

impl Optimizer for Adam {
    fn step(&mut self, layers: &mut [Layer], grads: &[(Matrix, Matrix)]) {
        self.ensure_moments(grads);
        self.t += 1;

        let t = self.t as i32;
        let lr_t = self.lr * (1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t));

        let mut m = std::mem::take(&mut self.m);
        let mut v = std::mem::take(&mut self.v);
        for (i, (layer, (w_grad, b_grad))) in layers.iter_mut().zip(grads).enumerate() {
            let w_dir = self.direction(&mut m[i].0, &mut v[i].0, w_grad);
            let b_dir = self.direction(&mut m[i].1, &mut v[i].1, b_grad);
            layer.apply_gradients(&w_dir, &b_dir, lr_t);
        }
        self.m = m;
        self.v = v;
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn identity_layer() -> Layer {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = Layer::new(1, 1, ActivationFunction::Identity, 0.0, 1.0, &mut rng);
        layer.weights = Matrix::filled(1, 1, 1.0);
        layer
    }

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        // With bias correction the first update is ±lr regardless of gradient scale.
        let mut adam = Adam::new(0.01);
        let mut layers = vec![identity_layer()];
        let grads = vec![(Matrix::filled(1, 1, 250.0), Matrix::filled(1, 1, -0.003))];
        adam.step(&mut layers, &grads);
        assert!((layers[0].weights.data[0][0] - 0.99).abs() < 1e-5);
        assert!((layers[0].biases.data[0][0] - 0.01).abs() < 1e-5);
        assert_eq!(adam.step_count(), 1);
    }

    #[test]
    fn test_minimises_quadratic() {
        // f(w) = (w - 3)², gradient 2(w - 3)
        let mut adam = Adam::new(0.1);
        let mut layers = vec![identity_layer()];
        for _ in 0..1000 {
            let w = layers[0].weights.data[0][0];
            let grads = vec![(Matrix::filled(1, 1, 2.0 * (w - 3.0)), Matrix::zeros(1, 1))];
            adam.step(&mut layers, &grads);
        }
        assert!((layers[0].weights.data[0][0] - 3.0).abs() < 0.1);
    }
}
