use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::layers::param::Param;
use crate::math::init;

/// Fully connected layer operating on one example at a time.
///
/// Weights are stored row-major as `[out_size][in_size]`. `forward` returns
/// the pre-activation vector alongside the output so that `backward` can
/// evaluate the activation derivative at the right point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub in_size: usize,
    pub out_size: usize,
    pub weights: Param,
    pub biases: Param,
    pub activator: ActivationFunction,
}

impl Dense {
    /// He init before rectifiers, Xavier otherwise; biases start at zero.
    pub fn new(in_size: usize, out_size: usize, activation: ActivationFunction) -> Dense {
        let mut w = vec![0.0; in_size * out_size];
        match activation {
            ActivationFunction::ReLU | ActivationFunction::LeakyReLU { .. } => {
                init::he(&mut w, in_size)
            }
            _ => init::xavier(&mut w, in_size),
        }
        Dense {
            in_size,
            out_size,
            weights: Param::new(w),
            biases: Param::new(vec![0.0; out_size]),
            activator: activation,
        }
    }

    /// Forward pass for one example. Returns `(pre, out)`.
    pub fn forward(&self, x: &[f64]) -> (Vec<f64>, Vec<f64>) {
        assert_eq!(x.len(), self.in_size, "dense input size mismatch");
        let mut pre = self.biases.value.clone();
        for o in 0..self.out_size {
            let row = &self.weights.value[o * self.in_size..(o + 1) * self.in_size];
            let mut sum = 0.0;
            for (wi, xi) in row.iter().zip(x.iter()) {
                sum += wi * xi;
            }
            pre[o] += sum;
        }
        let out = pre.iter().map(|&p| self.activator.function(p)).collect();
        (pre, out)
    }

    /// Backward pass for one example: accumulates weight and bias gradients
    /// and returns dL/dx. `d_out` is dL/d(activated output); `pre` and `x`
    /// are the values captured by the matching `forward` call.
    pub fn backward(&mut self, d_out: &[f64], pre: &[f64], x: &[f64]) -> Vec<f64> {
        let mut dx = vec![0.0; self.in_size];
        let Param {
            value: w_val,
            grad: w_grad,
            ..
        } = &mut self.weights;
        for o in 0..self.out_size {
            let delta = d_out[o] * self.activator.derivative(pre[o]);
            self.biases.grad[o] += delta;
            let row = o * self.in_size;
            for i in 0..self.in_size {
                w_grad[row + i] += delta * x[i];
                dx[i] += delta * w_val[row + i];
            }
        }
        dx
    }
}

#[test]
fn gradcheck_dense() {
    let mut rng = rand::thread_rng();
    let layer = Dense::new(5, 4, ActivationFunction::Sigmoid);
    let x: Vec<f64> = (0..5).map(|_| init::standard_normal(&mut rng)).collect();
    let upstream: Vec<f64> = (0..4).map(|_| init::standard_normal(&mut rng)).collect();

    // Scalar objective: dot(out, upstream).
    let objective = |l: &Dense, x: &[f64]| -> f64 {
        let (_, out) = l.forward(x);
        out.iter().zip(upstream.iter()).map(|(a, b)| a * b).sum()
    };

    let mut probe = layer.clone();
    let (pre, _) = layer.forward(&x);
    let dx = probe.backward(&upstream, &pre, &x);

    let h = 1e-6;
    for j in 0..layer.weights.value.len() {
        let mut plus = layer.clone();
        plus.weights.value[j] += h;
        let mut minus = layer.clone();
        minus.weights.value[j] -= h;
        let numeric = (objective(&plus, &x) - objective(&minus, &x)) / (2.0 * h);
        assert!(
            (numeric - probe.weights.grad[j]).abs() < 1e-6,
            "weight {}: analytic {} vs numeric {}",
            j,
            probe.weights.grad[j],
            numeric
        );
    }
    for j in 0..layer.biases.value.len() {
        let mut plus = layer.clone();
        plus.biases.value[j] += h;
        let mut minus = layer.clone();
        minus.biases.value[j] -= h;
        let numeric = (objective(&plus, &x) - objective(&minus, &x)) / (2.0 * h);
        assert!(
            (numeric - probe.biases.grad[j]).abs() < 1e-6,
            "bias {}: analytic {} vs numeric {}",
            j,
            probe.biases.grad[j],
            numeric
        );
    }
    for j in 0..x.len() {
        let mut xp = x.clone();
        xp[j] += h;
        let mut xm = x.clone();
        xm[j] -= h;
        let numeric = (objective(&layer, &xp) - objective(&layer, &xm)) / (2.0 * h);
        assert!(
            (numeric - dx[j]).abs() < 1e-6,
            "input {}: analytic {} vs numeric {}",
            j,
            dx[j],
            numeric
        );
    }
}
