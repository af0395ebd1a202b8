/// Softmax cross-entropy over raw class scores (logits).
///
/// The network's classification head has no softmax layer; the softmax is
/// folded into the loss so the log-sum-exp can be evaluated stably.
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    /// L = log(Σ exp(z_j)) - z_class
    pub fn loss(logits: &[f64], class: usize) -> f64 {
        log_sum_exp(logits) - logits[class]
    }

    /// ∂L/∂z_i = softmax(z)_i - 1[i == class]
    pub fn derivative(logits: &[f64], class: usize) -> Vec<f64> {
        let mut grad = softmax(logits);
        grad[class] -= 1.0;
        grad
    }
}

pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn log_sum_exp(logits: &[f64]) -> f64 {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + logits.iter().map(|z| (z - max).exp()).sum::<f64>().ln()
}
