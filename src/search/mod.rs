pub mod space;
pub mod study;

pub use space::{SampledParams, SearchSpace};
pub use study::Study;
