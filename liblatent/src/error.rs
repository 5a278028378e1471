use thiserror::Error;

/// An Error that is thrown when the caller supplies a model, sequence,
/// or vector that the requested operation can't be computed on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInputError {
    #[error("the state set is empty")]
    EmptyStates,
    #[error("the observation sequence is empty")]
    EmptyObservations,
    #[error("the observation alphabet is empty")]
    EmptyAlphabet,
    #[error("sequence of length {length} is shorter than the required {minimum}")]
    SequenceTooShort { length: usize, minimum: usize },
    #[error("observation {symbol} at position {position} is not in the model's alphabet")]
    UnknownSymbol { position: usize, symbol: String },
    #[error("{table} has no entry for {key}")]
    MissingEntry { table: &'static str, key: String },
    #[error("time index {time} is out of range for a table of length {length}")]
    TimeOutOfRange { time: usize, length: usize },
    #[error("{what} has length {actual}, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },
}

/// An Error that is thrown when a normalization step
/// would divide by zero (or by something that isn't finite).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("degenerate normalization in {table} at index {index}")]
pub struct NumericDegeneracyError {
    pub table: &'static str,
    pub index: usize,
}
