use std::io;
use std::path::Path;

use rand::rngs::ThreadRng;
use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::layers::{Conv2d, ConvTranspose2d, Dense, Param};
use crate::math::init;

/// Side length of the square input images.
pub const IMAGE_SIDE: usize = 28;
/// Pixels per image.
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;

// Spatial side after the two halving convolutions (28 → 14 → 7).
const MAP_SIDE: usize = IMAGE_SIDE / 4;
const HALF_SIDE: usize = IMAGE_SIDE / 2;

// Floors the log argument in the latent loss so a zero spread yields a
// large-but-finite value with a finite gradient instead of -inf.
const LOG_FLOOR: f64 = 1e-8;

const LEAK: f64 = 0.2;

/// Variational autoencoder over 28×28 grayscale digit images.
///
/// The encoder is two strided convolutions followed by two independent
/// linear heads producing the latent mean and spread; the decoder expands a
/// latent sample back through two transposed convolutions to pixel space.
/// Both halves are trained jointly against the sum of a per-pixel squared
/// reconstruction error and a KL penalty toward the standard normal prior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vae {
    pub n_z: usize,
    enc1: Conv2d,
    enc2: Conv2d,
    fc_mean: Dense,
    fc_spread: Dense,
    fc_expand: Dense,
    dec1: ConvTranspose2d,
    dec2: ConvTranspose2d,
}

/// Every intermediate value of one forward pass through the model, kept so
/// `backward` can replay the chain rule without recomputation.
pub struct Forward {
    pub enc1_pre: Vec<f64>,
    pub enc1_out: Vec<f64>,
    pub enc2_pre: Vec<f64>,
    pub enc2_out: Vec<f64>,
    pub mean_pre: Vec<f64>,
    pub mean: Vec<f64>,
    pub spread_pre: Vec<f64>,
    pub spread: Vec<f64>,
    pub noise: Vec<f64>,
    pub z: Vec<f64>,
    pub expand_pre: Vec<f64>,
    pub expand_out: Vec<f64>,
    pub dec1_pre: Vec<f64>,
    pub dec1_out: Vec<f64>,
    pub dec2_pre: Vec<f64>,
    pub recon: Vec<f64>,
}

impl Vae {
    /// Builds a model with freshly initialized weights.
    ///
    /// `e_h1`/`e_h2` are the encoder convolution channel widths,
    /// `d_h1`/`d_h2` the decoder widths, `n_z` the latent dimensionality.
    pub fn new(n_z: usize, e_h1: usize, e_h2: usize, d_h1: usize, d_h2: usize) -> Vae {
        let flat = MAP_SIDE * MAP_SIDE * e_h2;
        let lrelu = ActivationFunction::LeakyReLU { alpha: LEAK };
        Vae {
            n_z,
            enc1: Conv2d::new(1, e_h1, lrelu),
            enc2: Conv2d::new(e_h1, e_h2, lrelu),
            fc_mean: Dense::new(flat, n_z, ActivationFunction::Identity),
            fc_spread: Dense::new(flat, n_z, ActivationFunction::Identity),
            fc_expand: Dense::new(n_z, MAP_SIDE * MAP_SIDE * d_h1, ActivationFunction::ReLU),
            dec1: ConvTranspose2d::new(d_h1, d_h2, ActivationFunction::ReLU),
            dec2: ConvTranspose2d::new(d_h2, 1, ActivationFunction::Sigmoid),
        }
    }

    /// Full stochastic forward pass for one example; latent noise is drawn
    /// from N(0, 1) per dimension.
    pub fn forward(&self, x: &[f64], rng: &mut ThreadRng) -> Forward {
        let noise = (0..self.n_z).map(|_| init::standard_normal(rng)).collect();
        self.forward_with_noise(x, noise)
    }

    /// Forward pass with caller-supplied latent noise; the deterministic
    /// core of `forward`.
    pub fn forward_with_noise(&self, x: &[f64], noise: Vec<f64>) -> Forward {
        assert_eq!(x.len(), IMAGE_PIXELS, "input must be a flat 28x28 image");
        assert_eq!(noise.len(), self.n_z);
        let (enc1_pre, enc1_out) = self.enc1.forward(x, IMAGE_SIDE, IMAGE_SIDE);
        let (enc2_pre, enc2_out) = self.enc2.forward(&enc1_out, HALF_SIDE, HALF_SIDE);
        let (mean_pre, mean) = self.fc_mean.forward(&enc2_out);
        let (spread_pre, spread) = self.fc_spread.forward(&enc2_out);
        // Reparameterization: a sample from N(mean, spread²) expressed as a
        // deterministic function of (mean, spread) and independent noise.
        let z: Vec<f64> = mean
            .iter()
            .zip(spread.iter())
            .zip(noise.iter())
            .map(|((m, s), e)| m + s * e)
            .collect();
        let (expand_pre, expand_out) = self.fc_expand.forward(&z);
        let (dec1_pre, dec1_out) = self.dec1.forward(&expand_out, MAP_SIDE, MAP_SIDE);
        let (dec2_pre, recon) = self.dec2.forward(&dec1_out, HALF_SIDE, HALF_SIDE);
        Forward {
            enc1_pre,
            enc1_out,
            enc2_pre,
            enc2_out,
            mean_pre,
            mean,
            spread_pre,
            spread,
            noise,
            z,
            expand_pre,
            expand_out,
            dec1_pre,
            dec1_out,
            dec2_pre,
            recon,
        }
    }

    /// Reconstruction loss for one example: squared pixel differences
    /// summed over the whole image.
    pub fn generation_loss(x: &[f64], recon: &[f64]) -> f64 {
        x.iter()
            .zip(recon.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// KL divergence of N(mean, spread²) from N(0, 1) for one example,
    /// summed over latent dimensions.
    pub fn latent_loss(mean: &[f64], spread: &[f64]) -> f64 {
        mean.iter()
            .zip(spread.iter())
            .map(|(m, s)| 0.5 * (m * m + s * s - (s * s + LOG_FLOOR).ln() - 1.0))
            .sum()
    }

    /// Accumulates gradients of `scale * (generation_loss + latent_loss)`
    /// for one example into every layer's `Param::grad`. `scale` is
    /// typically 1/batch so that accumulating over a minibatch yields the
    /// gradient of the batch-mean objective.
    pub fn backward(&mut self, x: &[f64], f: &Forward, scale: f64) {
        // d(generation_loss)/d(recon) = 2 (recon - x).
        let d_recon: Vec<f64> = f
            .recon
            .iter()
            .zip(x.iter())
            .map(|(r, xv)| 2.0 * (r - xv) * scale)
            .collect();
        let d_dec1 = self
            .dec2
            .backward(&d_recon, &f.dec2_pre, &f.dec1_out, HALF_SIDE, HALF_SIDE);
        let d_expand = self
            .dec1
            .backward(&d_dec1, &f.dec1_pre, &f.expand_out, MAP_SIDE, MAP_SIDE);
        let d_z = self.fc_expand.backward(&d_expand, &f.expand_pre, &f.z);

        // Heads: the sample path contributes dz (times 1 for the mean, times
        // the noise for the spread); the KL term adds mean and
        // spread - spread/(spread² + floor) respectively.
        let d_mean: Vec<f64> = d_z
            .iter()
            .zip(f.mean.iter())
            .map(|(dz, m)| dz + m * scale)
            .collect();
        let d_spread: Vec<f64> = d_z
            .iter()
            .zip(f.spread.iter())
            .zip(f.noise.iter())
            .map(|((dz, s), e)| dz * e + (s - s / (s * s + LOG_FLOOR)) * scale)
            .collect();

        let mut d_flat = self.fc_mean.backward(&d_mean, &f.mean_pre, &f.enc2_out);
        let d_flat2 = self
            .fc_spread
            .backward(&d_spread, &f.spread_pre, &f.enc2_out);
        for (a, b) in d_flat.iter_mut().zip(d_flat2.iter()) {
            *a += b;
        }

        let d_enc1 = self
            .enc2
            .backward(&d_flat, &f.enc2_pre, &f.enc1_out, HALF_SIDE, HALF_SIDE);
        self.enc1
            .backward(&d_enc1, &f.enc1_pre, x, IMAGE_SIDE, IMAGE_SIDE);
    }

    /// All learnable tensors, in a fixed order.
    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        vec![
            &mut self.enc1.weights,
            &mut self.enc1.biases,
            &mut self.enc2.weights,
            &mut self.enc2.biases,
            &mut self.fc_mean.weights,
            &mut self.fc_mean.biases,
            &mut self.fc_spread.weights,
            &mut self.fc_spread.biases,
            &mut self.fc_expand.weights,
            &mut self.fc_expand.biases,
            &mut self.dec1.weights,
            &mut self.dec1.biases,
            &mut self.dec2.weights,
            &mut self.dec2.biases,
        ]
    }

    pub fn zero_grads(&mut self) {
        for p in self.params_mut() {
            p.zero_grad();
        }
    }

    /// Serializes the model weights to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    /// Deserializes a model from a JSON file previously written by
    /// `save_json`, rebuilding the optimizer scratch buffers.
    pub fn load_json(path: &Path) -> io::Result<Vae> {
        let file = std::fs::File::open(path)?;
        let reader = io::BufReader::new(file);
        let mut model: Vae = serde_json::from_reader(reader)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        for p in model.params_mut() {
            p.reset_scratch();
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::adam::Adam;

    fn tiny() -> Vae {
        Vae::new(2, 2, 3, 3, 2)
    }

    fn total_loss(model: &Vae, x: &[f64], noise: &[f64]) -> f64 {
        let f = model.forward_with_noise(x, noise.to_vec());
        Vae::generation_loss(x, &f.recon) + Vae::latent_loss(&f.mean, &f.spread)
    }

    #[test]
    fn forward_produces_unit_interval_reconstruction() {
        let mut rng = rand::thread_rng();
        let model = tiny();
        let x = vec![0.5; IMAGE_PIXELS];
        let f = model.forward(&x, &mut rng);
        assert_eq!(f.recon.len(), IMAGE_PIXELS);
        assert!(f.recon.iter().all(|&p| p > 0.0 && p < 1.0));
        assert_eq!(f.z.len(), 2);
    }

    #[test]
    fn losses_are_finite_and_nonnegative() {
        let mut rng = rand::thread_rng();
        let model = tiny();
        let x = vec![0.25; IMAGE_PIXELS];
        let f = model.forward(&x, &mut rng);
        let gen = Vae::generation_loss(&x, &f.recon);
        let lat = Vae::latent_loss(&f.mean, &f.spread);
        assert!(gen.is_finite() && gen >= 0.0);
        assert!(lat.is_finite());
    }

    #[test]
    fn latent_loss_is_zero_at_the_prior() {
        // mean 0, spread 1 is exactly the prior; the floor inside the log
        // shifts the value by under 1e-8 per dimension.
        let loss = Vae::latent_loss(&[0.0, 0.0], &[1.0, 1.0]);
        assert!(loss.abs() < 1e-7, "loss at prior was {}", loss);
    }

    #[test]
    fn latent_loss_survives_a_zero_spread() {
        let loss = Vae::latent_loss(&[0.0], &[0.0]);
        assert!(loss.is_finite());
        assert!(loss > 1.0);
    }

    #[test]
    fn one_optimizer_step_runs_for_assorted_widths() {
        let mut rng = rand::thread_rng();
        for (n_z, e1, e2, d1, d2) in [(2, 2, 3, 3, 2), (5, 4, 4, 4, 4), (1, 1, 1, 1, 1)] {
            let mut model = Vae::new(n_z, e1, e2, d1, d2);
            let mut adam = Adam::new(1e-3);
            let batch: Vec<Vec<f64>> = (0..3).map(|i| vec![0.1 * (i + 1) as f64; IMAGE_PIXELS]).collect();
            model.zero_grads();
            for x in &batch {
                let f = model.forward(x, &mut rng);
                model.backward(x, &f, 1.0 / batch.len() as f64);
            }
            adam.step(model.params_mut());
        }
    }

    #[test]
    fn checkpoint_round_trip_preserves_reconstruction() {
        let model = tiny();
        let x = vec![0.7; IMAGE_PIXELS];
        let noise = vec![0.3, -0.4];
        let before = total_loss(&model, &x, &noise);

        let path = std::env::temp_dir().join(format!(
            "mnist-vae-ckpt-test-{}.json",
            std::process::id()
        ));
        model.save_json(&path).unwrap();
        let back = Vae::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let after = total_loss(&back, &x, &noise);
        assert!((before - after).abs() < 1e-12);
    }

    #[test]
    fn gradcheck_full_model() {
        // Swap the kinked activations for sigmoid so central differences
        // are valid at every probe point; the chain rule under test is the
        // same either way.
        let mut rng = rand::thread_rng();
        let mut model = tiny();
        model.enc1.activator = ActivationFunction::Sigmoid;
        model.enc2.activator = ActivationFunction::Sigmoid;
        model.fc_expand.activator = ActivationFunction::Sigmoid;
        model.dec1.activator = ActivationFunction::Sigmoid;

        let x: Vec<f64> = (0..IMAGE_PIXELS)
            .map(|i| 0.5 + 0.4 * ((i as f64 * 0.37).sin()))
            .collect();
        let noise: Vec<f64> = (0..2).map(|_| init::standard_normal(&mut rng)).collect();

        model.zero_grads();
        let f = model.forward_with_noise(&x, noise.clone());
        let mut analytic = model.clone();
        analytic.backward(&x, &f, 1.0);

        let h = 1e-5;
        let n_tensors = model.params_mut().len();
        for ti in 0..n_tensors {
            let len = model.params_mut()[ti].value.len();
            // Stride through big tensors; check small ones exhaustively.
            let stride = if len > 64 { 13 } else { 1 };
            for j in (0..len).step_by(stride) {
                let mut plus = model.clone();
                plus.params_mut()[ti].value[j] += h;
                let mut minus = model.clone();
                minus.params_mut()[ti].value[j] -= h;
                let numeric =
                    (total_loss(&plus, &x, &noise) - total_loss(&minus, &x, &noise)) / (2.0 * h);
                let got = analytic.params_mut()[ti].grad[j];
                let tol = 1e-4 * numeric.abs().max(1.0);
                assert!(
                    (numeric - got).abs() < tol,
                    "tensor {} index {}: analytic {} vs numeric {}",
                    ti,
                    j,
                    got,
                    numeric
                );
            }
        }
    }
}
