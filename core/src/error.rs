use thiserror::Error;

/// Errors raised while building or querying an index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("unknown id: {0}")]
    UnknownId(u32),

    #[error("term {0} has no postings in this index")]
    UnknownTerm(u32),

    #[error("corrupt postings data: {0}")]
    CodecCorruption(String),

    #[error("invalid index file: {0}")]
    InvalidFormat(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        IndexError::CodecCorruption(msg.into())
    }
}
