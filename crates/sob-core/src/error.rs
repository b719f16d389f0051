use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Design vector has {actual} components, problem expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Design variable {index} = {value} lies outside the search space [{lower}, {upper}]"
    )]
    OutOfSearchSpace {
        index: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("Non-finite design variable at index {index}")]
    NonFinite { index: usize },

    #[error("Unknown topology id: {0}")]
    UnknownTopology(u32),

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
