use serde::{Deserialize, Serialize};

/// Immutable hyperparameter record for one training run.
///
/// # Fields
/// - `frac_train`    — fraction of the dataset used for training, in (0, 1];
///                     the remainder becomes the fixed validation slice
/// - `n_z`           — number of latent gaussian variables produced by the
///                     encoder and consumed by the decoder
/// - `batch_size`    — examples per training minibatch
/// - `learning_rate` — Adam learning rate
/// - `max_epochs`    — epoch budget for the run
/// - `e_h1`, `e_h2`  — encoder convolution channel widths
/// - `d_h1`, `d_h2`  — decoder convolution channel widths
/// - `run_id`        — identifier naming the artifact directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub frac_train: f64,
    pub n_z: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub e_h1: usize,
    pub e_h2: usize,
    pub d_h1: usize,
    pub d_h2: usize,
    pub run_id: i64,
}

impl RunConfig {
    /// The fixed reference configuration used by the no-argument CLI mode.
    pub fn reference() -> RunConfig {
        RunConfig {
            frac_train: 0.99,
            n_z: 20,
            batch_size: 100,
            learning_rate: 0.001,
            max_epochs: 10,
            e_h1: 16,
            e_h2: 32,
            d_h1: 32,
            d_h2: 16,
            run_id: -1,
        }
    }

    /// Checks every invariant that does not depend on the dataset size.
    /// The batch-size vs. validation-size invariant is checked by the
    /// trainer once the split is known.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.frac_train > 0.0 && self.frac_train <= 1.0) {
            return Err(format!(
                "frac_train must lie in (0, 1], got {}",
                self.frac_train
            ));
        }
        if self.n_z == 0 {
            return Err("n_z must be at least 1".to_owned());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_owned());
        }
        if self.max_epochs == 0 {
            return Err("max_epochs must be at least 1".to_owned());
        }
        if self.e_h1 == 0 || self.e_h2 == 0 || self.d_h1 == 0 || self.d_h2 == 0 {
            return Err("layer widths must all be at least 1".to_owned());
        }
        if !(self.learning_rate > 0.0) {
            return Err(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_config_is_valid() {
        assert!(RunConfig::reference().validate().is_ok());
    }

    #[test]
    fn out_of_range_fraction_is_rejected() {
        for frac in [0.0, -0.5, 1.5, f64::NAN] {
            let cfg = RunConfig {
                frac_train: frac,
                ..RunConfig::reference()
            };
            assert!(cfg.validate().is_err(), "frac {} slipped through", frac);
        }
    }

    #[test]
    fn zero_counts_are_rejected() {
        let mut cfg = RunConfig::reference();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());
        let mut cfg = RunConfig::reference();
        cfg.d_h2 = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_positive_learning_rate_is_rejected() {
        for lr in [0.0, -1.0, f64::NAN] {
            let cfg = RunConfig {
                learning_rate: lr,
                ..RunConfig::reference()
            };
            assert!(cfg.validate().is_err(), "lr {} slipped through", lr);
        }
    }
}
