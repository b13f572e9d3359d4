use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("malformed receipt: {0}")]
    MalformedReceipt(String),

    #[error("digest failure: {0}")]
    DigestFailure(String),
}
