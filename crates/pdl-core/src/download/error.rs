use thiserror::Error;

/// Fatal problems while preparing the output file. None of these are retried.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("insufficient free space: need {needed} bytes, {available} available")]
    InsufficientSpace { needed: u64, available: u64 },
    #[error("file name too long even after truncation: {0}")]
    NameTooLong(String),
    #[error("setup aborted by stop request")]
    Aborted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
