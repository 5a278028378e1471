pub mod model;
pub use model::{Hmm, HmmParams, Label, ProbMap, StochasticMatrix};

pub mod params;
pub use params::{BaumWelchParams, BaumWelchParamsBuilder, BaumWelchProgress, Variant};

pub mod prob_table;
pub use prob_table::ProbTable;
