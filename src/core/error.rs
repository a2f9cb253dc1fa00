use crate::core::status::Code;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("RPC failed with {code}: {message}")]
    Rpc { code: Code, message: String },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    pub fn rpc(code: Code, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
