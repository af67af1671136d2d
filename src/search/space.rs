use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::train::config::RunConfig;

/// Hyperparameter ranges explored by the search driver. All integer ranges
/// are inclusive; the learning rate is expressed as base-2 exponent bounds
/// and sampled log-uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSpace {
    pub n_z: (usize, usize),
    pub e_h1: (usize, usize),
    pub e_h2: (usize, usize),
    pub d_h1: (usize, usize),
    pub d_h2: (usize, usize),
    pub max_epochs: (usize, usize),
    pub lr_log2: (f64, f64),
}

impl SearchSpace {
    /// The default space for the digit VAE.
    pub fn digits() -> SearchSpace {
        SearchSpace {
            n_z: (5, 100),
            e_h1: (16, 256),
            e_h2: (16, 256),
            d_h1: (16, 256),
            d_h2: (16, 256),
            max_epochs: (5, 200),
            lr_log2: (-20.0, -8.0),
        }
    }

    /// Draws one parameter set, uniform per dimension (log-uniform for the
    /// learning rate).
    pub fn sample(&self, rng: &mut ThreadRng) -> SampledParams {
        SampledParams {
            n_z: rng.gen_range(self.n_z.0..=self.n_z.1),
            learning_rate: 2f64.powf(rng.gen_range(self.lr_log2.0..=self.lr_log2.1)),
            max_epochs: rng.gen_range(self.max_epochs.0..=self.max_epochs.1),
            e_h1: rng.gen_range(self.e_h1.0..=self.e_h1.1),
            e_h2: rng.gen_range(self.e_h2.0..=self.e_h2.1),
            d_h1: rng.gen_range(self.d_h1.0..=self.d_h1.1),
            d_h2: rng.gen_range(self.d_h2.0..=self.d_h2.1),
        }
    }
}

/// One sampled configuration, as recorded in the study file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledParams {
    pub n_z: usize,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub e_h1: usize,
    pub e_h2: usize,
    pub d_h1: usize,
    pub d_h2: usize,
}

impl SampledParams {
    /// Expands into a full run configuration; the split fraction, batch
    /// size, and run id come from the caller, not the search space.
    pub fn into_config(&self, frac_train: f64, batch_size: usize, run_id: i64) -> RunConfig {
        RunConfig {
            frac_train,
            n_z: self.n_z,
            batch_size,
            learning_rate: self.learning_rate,
            max_epochs: self.max_epochs,
            e_h1: self.e_h1,
            e_h2: self.e_h2,
            d_h1: self.d_h1,
            d_h2: self.d_h2,
            run_id,
        }
    }
}
