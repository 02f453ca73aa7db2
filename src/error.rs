//! Domain error types for the core pipeline.
//!
//! Hand-written enums with manual `Display`/`Error` impls; outer plumbing
//! (config, startup) uses `anyhow::Result` instead.

use std::fmt;

/// Failure to apply a new snapshot to the book.
#[derive(Debug, Clone, PartialEq)]
pub enum BookError {
    /// A `(price, quantity)` pair could not be parsed as a decimal.
    InvalidLevel { side: &'static str, price: String, quantity: String },
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::InvalidLevel { side, price, quantity } => write!(
                f,
                "invalid {side} level: price={price:?} quantity={quantity:?}"
            ),
        }
    }
}

impl std::error::Error for BookError {}

/// Rejection of a `set_parameter` request. Prior parameters are retained.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterError {
    UnknownName(String),
    InvalidValue { name: &'static str, reason: String },
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterError::UnknownName(name) => write!(f, "unrecognized parameter: {name}"),
            ParameterError::InvalidValue { name, reason } => {
                write!(f, "invalid value for parameter {name}: {reason}")
            }
        }
    }
}

impl std::error::Error for ParameterError {}
