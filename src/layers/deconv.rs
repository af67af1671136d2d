use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::layers::param::Param;
use crate::layers::{KERNEL, PAD, STRIDE};
use crate::math::init;

/// Transposed 2D convolution doubling the spatial resolution — the exact
/// adjoint of `Conv2d` with the same kernel geometry.
///
/// Weights are stored flat as `[in_ch][out_ch][kh][kw]`; inputs and outputs
/// are channel-major flat slices `[ch][h][w]` for a single example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvTranspose2d {
    pub in_ch: usize,
    pub out_ch: usize,
    pub weights: Param,
    pub biases: Param,
    pub activator: ActivationFunction,
}

impl ConvTranspose2d {
    pub fn new(in_ch: usize, out_ch: usize, activation: ActivationFunction) -> ConvTranspose2d {
        let fan_in = in_ch * KERNEL * KERNEL;
        let mut w = vec![0.0; in_ch * out_ch * KERNEL * KERNEL];
        match activation {
            ActivationFunction::ReLU | ActivationFunction::LeakyReLU { .. } => {
                init::he(&mut w, fan_in)
            }
            _ => init::xavier(&mut w, fan_in),
        }
        ConvTranspose2d {
            in_ch,
            out_ch,
            weights: Param::new(w),
            biases: Param::new(vec![0.0; out_ch]),
            activator: activation,
        }
    }

    /// Forward pass for one example of shape `[in_ch][in_h][in_w]`.
    /// Returns `(pre, out)` of shape `[out_ch][in_h*2][in_w*2]`.
    pub fn forward(&self, x: &[f64], in_h: usize, in_w: usize) -> (Vec<f64>, Vec<f64>) {
        assert_eq!(
            x.len(),
            self.in_ch * in_h * in_w,
            "deconv input size mismatch"
        );
        let (out_h, out_w) = (in_h * STRIDE, in_w * STRIDE);
        let mut pre = vec![0.0; self.out_ch * out_h * out_w];
        for co in 0..self.out_ch {
            let base = co * out_h * out_w;
            for i in 0..out_h * out_w {
                pre[base + i] = self.biases.value[co];
            }
        }
        // Scatter: every input cell contributes a kernel-sized patch.
        for ci in 0..self.in_ch {
            for ih in 0..in_h {
                for iw in 0..in_w {
                    let xv = x[(ci * in_h + ih) * in_w + iw];
                    for co in 0..self.out_ch {
                        for kh in 0..KERNEL {
                            let oh = (ih * STRIDE + kh) as isize - PAD as isize;
                            if oh < 0 || oh >= out_h as isize {
                                continue;
                            }
                            for kw in 0..KERNEL {
                                let ow = (iw * STRIDE + kw) as isize - PAD as isize;
                                if ow < 0 || ow >= out_w as isize {
                                    continue;
                                }
                                let wi = ((ci * self.out_ch + co) * KERNEL + kh) * KERNEL + kw;
                                pre[(co * out_h + oh as usize) * out_w + ow as usize] +=
                                    xv * self.weights.value[wi];
                            }
                        }
                    }
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
        let (out_h, out_w) = (in_h * STRIDE, in_w * STRIDE);
        let mut delta = vec![0.0; d_out.len()];
        for i in 0..d_out.len() {
            delta[i] = d_out[i] * self.activator.derivative(pre[i]);
        }
        for co in 0..self.out_ch {
            let base = co * out_h * out_w;
            for i in 0..out_h * out_w {
                self.biases.grad[co] += delta[base + i];
            }
        }
        // Gather: dL/dx mirrors the forward scatter.
        let mut dx = vec![0.0; self.in_ch * in_h * in_w];
        let Param {
            value: w_val,
            grad: w_grad,
            ..
        } = &mut self.weights;
        for ci in 0..self.in_ch {
            for ih in 0..in_h {
                for iw in 0..in_w {
                    let xi = (ci * in_h + ih) * in_w + iw;
                    let xv = x[xi];
                    let mut acc = 0.0;
                    for co in 0..self.out_ch {
                        for kh in 0..KERNEL {
                            let oh = (ih * STRIDE + kh) as isize - PAD as isize;
                            if oh < 0 || oh >= out_h as isize {
                                continue;
                            }
                            for kw in 0..KERNEL {
                                let ow = (iw * STRIDE + kw) as isize - PAD as isize;
                                if ow < 0 || ow >= out_w as isize {
                                    continue;
                                }
                                let d = delta[(co * out_h + oh as usize) * out_w + ow as usize];
                                let wi = ((ci * self.out_ch + co) * KERNEL + kh) * KERNEL + kw;
                                w_grad[wi] += xv * d;
                                acc += w_val[wi] * d;
                            }
                        }
                    }
                    dx[xi] = acc;
                }
            }
        }
        dx
    }
}

#[test]
fn gradcheck_conv_transpose2d() {
    let mut rng = rand::thread_rng();
    let layer = ConvTranspose2d::new(3, 2, ActivationFunction::Sigmoid);
    let (in_h, in_w) = (3, 3);
    let x: Vec<f64> = (0..3 * in_h * in_w)
        .map(|_| init::standard_normal(&mut rng))
        .collect();
    let out_len = 2 * (in_h * STRIDE) * (in_w * STRIDE);
    let upstream: Vec<f64> = (0..out_len)
        .map(|_| init::standard_normal(&mut rng))
        .collect();

    let objective = |l: &ConvTranspose2d, x: &[f64]| -> f64 {
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
fn deconv_doubles_spatial_resolution() {
    let layer = ConvTranspose2d::new(4, 1, ActivationFunction::Sigmoid);
    let x = vec![0.1; 4 * 7 * 7];
    let (_, out) = layer.forward(&x, 7, 7);
    assert_eq!(out.len(), 14 * 14);
}
