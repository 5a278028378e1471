pub mod matrix;
pub use matrix::Matrix;

#[allow(clippy::module_inception)]
mod rbm;
pub use rbm::{Rbm, RbmParams, RbmParamsBuilder, DEFAULT_LEARNING_RATE};
