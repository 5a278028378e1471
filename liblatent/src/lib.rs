pub mod error;
pub mod hmm;
pub mod rbm;
pub mod util;
pub mod viz;
