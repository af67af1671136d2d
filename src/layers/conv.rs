use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::layers::param::Param;
use crate::layers::{KERNEL, PAD, STRIDE};
use crate::math::init;

/// Strided 2D convolution halving the spatial resolution.
///
/// Weights are stored flat as `[out_ch][in_ch][kh][kw]`; inputs and outputs
/// are channel-major flat slices `[ch][h][w]` for a single example. The
/// input height and width must be even.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    pub in_ch: usize,
    pub out_ch: usize,
    pub weights: Param,
    pub biases: Param,
    pub activator: ActivationFunction,
}

impl Conv2d {
    pub fn new(in_ch: usize, out_ch: usize, activation: ActivationFunction) -> Conv2d {
        let fan_in = in_ch * KERNEL * KERNEL;
        let mut w = vec![0.0; out_ch * fan_in];
        match activation {
            ActivationFunction::ReLU | ActivationFunction::LeakyReLU { .. } => {
                init::he(&mut w, fan_in)
            }
            _ => init::xavier(&mut w, fan_in),
        }
        Conv2d {
            in_ch,
            out_ch,
            weights: Param::new(w),
            biases: Param::new(vec![0.0; out_ch]),
            activator: activation,
        }
    }

    /// Forward pass for one example of shape `[in_ch][in_h][in_w]`.
    /// Returns `(pre, out)` of shape `[out_ch][in_h/2][in_w/2]`.
    pub fn forward(&self, x: &[f64], in_h: usize, in_w: usize) -> (Vec<f64>, Vec<f64>) {
        assert_eq!(x.len(), self.in_ch * in_h * in_w, "conv input size mismatch");
        let (out_h, out_w) = (in_h / STRIDE, in_w / STRIDE);
        let mut pre = vec![0.0; self.out_ch * out_h * out_w];
        for co in 0..self.out_ch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    let mut sum = self.biases.value[co];
                    for ci in 0..self.in_ch {
                        for kh in 0..KERNEL {
                            let ih = (oh * STRIDE + kh) as isize - PAD as isize;
                            if ih < 0 || ih >= in_h as isize {
                                continue;
                            }
                            for kw in 0..KERNEL {
                                let iw = (ow * STRIDE + kw) as isize - PAD as isize;
                                if iw < 0 || iw >= in_w as isize {
                                    continue;
                                }
                                let wi = ((co * self.in_ch + ci) * KERNEL + kh) * KERNEL + kw;
                                let xi = (ci * in_h + ih as usize) * in_w + iw as usize;
                                sum += self.weights.value[wi] * x[xi];
                            }
                        }
                    }
                    pre[(co * out_h + oh) * out_w + ow] = sum;
                }
            }
        }
        let out = pre.iter().map(|&p| self.activator.function(p)).collect();
        (pre, out)
    }

    /// Backward pass for one example: accumulates weight and bias gradients
    /// and returns dL/dx. `d_out` is dL/d(activated output).
    pub fn backward(
        &mut self,
        d_out: &[f64],
        pre: &[f64],
        x: &[f64],
        in_h: usize,
        in_w: usize,
    ) -> Vec<f64> {
        let (out_h, out_w) = (in_h / STRIDE, in_w / STRIDE);
        let mut dx = vec![0.0; self.in_ch * in_h * in_w];
        let Param {
            value: w_val,
            grad: w_grad,
            ..
        } = &mut self.weights;
        for co in 0..self.out_ch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    let oi = (co * out_h + oh) * out_w + ow;
                    let delta = d_out[oi] * self.activator.derivative(pre[oi]);
                    if delta == 0.0 {
                        continue;
                    }
                    self.biases.grad[co] += delta;
                    for ci in 0..self.in_ch {
                        for kh in 0..KERNEL {
                            let ih = (oh * STRIDE + kh) as isize - PAD as isize;
                            if ih < 0 || ih >= in_h as isize {
                                continue;
                            }
                            for kw in 0..KERNEL {
                                let iw = (ow * STRIDE + kw) as isize - PAD as isize;
                                if iw < 0 || iw >= in_w as isize {
                                    continue;
                                }
                                let wi = ((co * self.in_ch + ci) * KERNEL + kh) * KERNEL + kw;
                                let xi = (ci * in_h + ih as usize) * in_w + iw as usize;
                                w_grad[wi] += delta * x[xi];
                                dx[xi] += delta * w_val[wi];
                            }
                        }
                    }
                }
            }
        }
        dx
    }
}

#[test]
fn gradcheck_conv2d() {
    let mut rng = rand::thread_rng();
    let layer = Conv2d::new(2, 3, ActivationFunction::Sigmoid);
    let (in_h, in_w) = (6, 6);
    let x: Vec<f64> = (0..2 * in_h * in_w)
        .map(|_| init::standard_normal(&mut rng))
        .collect();
    let out_len = 3 * (in_h / STRIDE) * (in_w / STRIDE);
    let upstream: Vec<f64> = (0..out_len)
        .map(|_| init::standard_normal(&mut rng))
        .collect();

    let objective = |l: &Conv2d, x: &[f64]| -> f64 {
        let (_, out) = l.forward(x, in_h, in_w);
        out.iter().zip(upstream.iter()).map(|(a, b)| a * b).sum()
    };

    let mut probe = layer.clone();
    let (pre, _) = layer.forward(&x, in_h, in_w);
    let dx = probe.backward(&upstream, &pre, &x, in_h, in_w);

    let h = 1e-6;
    for j in 0..layer.weights.value.len() {
        let mut plus = layer.clone();
        plus.weights.value[j] += h;
        let mut minus = layer.clone();
        minus.weights.value[j] -= h;
        let numeric = (objective(&plus, &x) - objective(&minus, &x)) / (2.0 * h);
        assert!(
            (numeric - probe.weights.grad[j]).abs() < 1e-5,
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
            (numeric - probe.biases.grad[j]).abs() < 1e-5,
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
            (numeric - dx[j]).abs() < 1e-5,
            "input {}: analytic {} vs numeric {}",
            j,
            dx[j],
            numeric
        );
    }
}

#[test]
fn conv_halves_spatial_resolution() {
    let layer = Conv2d::new(1, 4, ActivationFunction::LeakyReLU { alpha: 0.2 });
    let x = vec![0.5; 28 * 28];
    let (_, out) = layer.forward(&x, 28, 28);
    assert_eq!(out.len(), 4 * 14 * 14);
}
