use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::data::provider::DigitSet;
use crate::train::config::RunConfig;
use crate::train::loop_fn::Trainer;
use crate::train::progress::PENALTY;

/// Result of one trial: either a usable validation score or a failure
/// marker that ranks as the fixed penalty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialScore {
    Valid(f64),
    Failed,
}

impl TrialScore {
    /// The scalar handed to the search driver. Always finite.
    pub fn value(&self) -> f64 {
        match self {
            TrialScore::Valid(score) => *score,
            TrialScore::Failed => PENALTY,
        }
    }
}

/// Runs `run` to completion, absorbing both `Err` results and panics into
/// `TrialScore::Failed`. A multi-trial search must survive any single
/// trial's failure, so nothing is allowed to escape this boundary.
pub fn run_guarded<F>(run: F) -> TrialScore
where
    F: FnOnce() -> Result<f64, String>,
{
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(score)) => TrialScore::Valid(score),
        Ok(Err(err)) => {
            eprintln!("trial failed: {}", err);
            TrialScore::Failed
        }
        Err(_) => {
            eprintln!("trial panicked; scoring it with the fixed penalty");
            TrialScore::Failed
        }
    }
}

/// Trains one configuration to a stopping state and returns its score.
///
/// Configuration and construction problems (invalid hyperparameters, an
/// unreadable dataset, a batch size larger than the validation set) fail
/// fast as `Err`. Once the loop is running, failures are absorbed by
/// `run_guarded` instead. Every call builds a fresh model, optimizer, and
/// progress state, so repeated calls never contaminate each other.
pub fn run_trial(config: &RunConfig, data_dir: &Path) -> Result<TrialScore, String> {
    config.validate()?;
    let data = DigitSet::from_idx_dir(data_dir)?;
    let mut trainer = Trainer::new(config.clone(), data)?;
    Ok(run_guarded(move || Ok(trainer.run()?.score)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_panicking_run_yields_the_finite_penalty() {
        let score = run_guarded(|| panic!("forced failure inside the training step"));
        assert_eq!(score, TrialScore::Failed);
        assert_eq!(score.value(), PENALTY);
        assert!(score.value().is_finite());
    }

    #[test]
    fn an_error_result_yields_the_finite_penalty() {
        let score = run_guarded(|| Err("disk full".to_owned()));
        assert_eq!(score.value(), PENALTY);
    }

    #[test]
    fn a_clean_run_passes_its_score_through() {
        let score = run_guarded(|| Ok(12.5));
        assert_eq!(score, TrialScore::Valid(12.5));
        assert_eq!(score.value(), 12.5);
    }

    #[test]
    fn missing_dataset_fails_fast() {
        let missing = Path::new("/nonexistent/mnist-vae-data");
        assert!(run_trial(&RunConfig::reference(), missing).is_err());
    }
}
