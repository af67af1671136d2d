pub mod math;
pub mod activation;
pub mod layers;
pub mod model;
pub mod optim;
pub mod data;
pub mod artifacts;
pub mod train;
pub mod search;

// Convenience re-exports
pub use activation::activation::ActivationFunction;
pub use artifacts::RunDir;
pub use data::provider::DigitSet;
pub use model::vae::Vae;
pub use optim::adam::Adam;
pub use search::space::SearchSpace;
pub use search::study::Study;
pub use train::config::RunConfig;
pub use train::loop_fn::{TrainOutcome, Trainer};
pub use train::progress::StopReason;
pub use train::trial::{run_trial, TrialScore};
