pub mod config;
pub mod loop_fn;
pub mod progress;
pub mod trial;

pub use config::RunConfig;
pub use loop_fn::{TrainOutcome, Trainer};
pub use progress::{EpochStats, Progress, StopReason, PATIENCE, PENALTY};
pub use trial::{run_trial, TrialScore};
