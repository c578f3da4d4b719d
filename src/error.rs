//! Error type shared by the builder, the factories and the resolver.

use crate::parser::ParseError;
use thiserror::Error as ThisError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum Error {
    /// The descriptor text does not match the grammar.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Arity or type constraint violated by a factory.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Mutation of a read-only condition, or an event after the end of the stream.
    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("parameter `{0}` was read before a value was bound")]
    UnresolvedParameter(String),

    #[error("parameter `{0}` is already bound")]
    ParameterAlreadyBound(String),

    #[error("unsupported value: {0}")]
    UnsupportedValue(String),
}

impl Error {
    pub(crate) fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument(message.into())
    }

    pub(crate) fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }
}
