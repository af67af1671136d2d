pub mod conv;
pub mod deconv;
pub mod dense;
pub mod param;

pub use conv::Conv2d;
pub use deconv::ConvTranspose2d;
pub use dense::Dense;
pub use param::Param;

/// Kernel geometry shared by the strided convolution and transposed
/// convolution: 4×4 kernels with stride 2 and padding 1 exactly halve
/// (resp. double) an even spatial resolution, with symmetric padding.
pub const KERNEL: usize = 4;
pub const STRIDE: usize = 2;
pub const PAD: usize = 1;
