use thiserror::Error;

pub type SfResult<T> = Result<T, SfError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SfError {
    #[error("Expected {expected} for {what}, got {found}")]
    TypeMismatch {
        what: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Non-finite numeric value for {what}")]
    NonFinite { what: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },
}
