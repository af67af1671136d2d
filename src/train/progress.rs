use serde::{Deserialize, Serialize};

/// Fixed score reported for runs that fail or never produce a usable
/// validation score. Chosen far above any real validation loss so failed
/// trials rank last in a search.
pub const PENALTY: f64 = 100_000.0;

/// Epochs without improvement tolerated before a run stops.
pub const PATIENCE: usize = 6;

/// Why a training run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The epoch budget was exhausted.
    Budget,
    /// No validation improvement for the whole patience window.
    Plateau,
    /// The validation score became NaN.
    Diverged,
}

/// Metrics recorded at one epoch boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    /// Mean reconstruction loss of the last training batch.
    pub gen_loss: f64,
    /// Mean latent loss of the last training batch.
    pub lat_loss: f64,
    /// Mean reconstruction loss over the full validation set.
    pub val_loss: f64,
}

/// Best-score bookkeeping for one run.
///
/// `observe` is fed the validation score once per epoch boundary; the loop
/// consults `keep_going`/`diverged` before each minibatch and
/// `final_score`/`stop_reason` at termination.
#[derive(Debug, Clone)]
pub struct Progress {
    pub best: Option<f64>,
    pub best_epoch: usize,
    pub last: f64,
}

impl Progress {
    pub fn new() -> Progress {
        Progress {
            best: None,
            best_epoch: 0,
            last: PENALTY,
        }
    }

    /// Records the validation score of `epoch`, keeping the best strictly
    /// improving finite score.
    pub fn observe(&mut self, epoch: usize, score: f64) {
        self.last = score;
        if score.is_finite() && self.best.map_or(true, |b| score < b) {
            self.best = Some(score);
            self.best_epoch = epoch;
        }
    }

    /// True once the validation score has gone NaN. Divergence is absorbing:
    /// every later batch of a NaN model stays NaN, so the loop stops here.
    pub fn diverged(&self) -> bool {
        self.last.is_nan()
    }

    /// True while the run still has epoch budget and patience left.
    pub fn keep_going(&self, epochs_completed: usize, max_epochs: usize) -> bool {
        epochs_completed < max_epochs && epochs_completed - self.best_epoch < PATIENCE
    }

    /// The reason the loop stopped, given the final epoch counter.
    pub fn stop_reason(&self, epochs_completed: usize, max_epochs: usize) -> StopReason {
        if self.diverged() {
            StopReason::Diverged
        } else if epochs_completed >= max_epochs {
            StopReason::Budget
        } else {
            StopReason::Plateau
        }
    }

    /// Final reported score: best-known, else the last finite score, else
    /// the fixed penalty. Never NaN.
    pub fn final_score(&self) -> f64 {
        match self.best {
            Some(best) => best,
            None if self.last.is_finite() => self.last,
            None => PENALTY,
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Progress::new()
    }
}
