use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every engine failure is a precondition violation, not a transient fault;
/// nothing here is retried internally.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed leaf: {0}")]
    MalformedLeaf(String),
    #[error("invalid root: {0}")]
    InvalidRoot(String),
    #[error("invalid parent: {0}")]
    InvalidParent(String),
    #[error("invalid leaf: {0}")]
    InvalidLeaf(String),
    #[error("invalid inheritance: {0}")]
    InvalidInheritance(String),
    #[error("record type mismatch: engine manages {expected}, got {actual}")]
    UnsupportedType { expected: String, actual: String },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}
