use rand::prelude::*;
use std::f64::consts::PI;

/// Samples a single value from N(0, 1) using the Box-Muller transform.
/// Both u1 and u2 must be uniform on (0, 1].
pub fn standard_normal(rng: &mut ThreadRng) -> f64 {
    // Draw two independent uniform samples in (0, 1] to avoid log(0).
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// He initialization: fills `buf` from N(0, sqrt(2 / fan_in)).
///
/// Recommended before ReLU-family layers. The variance 2/fan_in accounts
/// for the fact that a rectifier zeroes half of its inputs on average.
pub fn he(buf: &mut [f64], fan_in: usize) {
    let mut rng = rand::thread_rng();
    let std_dev = (2.0 / fan_in as f64).sqrt();
    for w in buf.iter_mut() {
        *w = standard_normal(&mut rng) * std_dev;
    }
}

/// Xavier (Glorot) initialization: fills `buf` from N(0, sqrt(1 / fan_in)).
///
/// Recommended before Sigmoid/Identity layers. Keeps the variance of
/// activations and gradients roughly equal across layers.
pub fn xavier(buf: &mut [f64], fan_in: usize) {
    let mut rng = rand::thread_rng();
    let std_dev = (1.0 / fan_in as f64).sqrt();
    for w in buf.iter_mut() {
        *w = standard_normal(&mut rng) * std_dev;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_normal_is_roughly_centered() {
        let mut rng = rand::thread_rng();
        let n = 10_000;
        let mean: f64 = (0..n).map(|_| standard_normal(&mut rng)).sum::<f64>() / n as f64;
        // Standard error of the mean is 1/sqrt(n) = 0.01; 6 sigma of slack.
        assert!(mean.abs() < 0.06, "sample mean {} too far from 0", mean);
    }

    #[test]
    fn he_scales_with_fan_in() {
        let mut buf = vec![0.0; 10_000];
        he(&mut buf, 200);
        let var: f64 = buf.iter().map(|w| w * w).sum::<f64>() / buf.len() as f64;
        let expected = 2.0 / 200.0;
        assert!(
            (var - expected).abs() < expected * 0.2,
            "variance {} not near {}",
            var,
            expected
        );
    }
}
