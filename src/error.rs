use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlixError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed Range header: {0}")]
    MalformedRange(String),

    #[error("Range {start}-{end} not satisfiable for {size} byte file")]
    RangeOutOfBounds { start: u64, end: u64, size: u64 },

    #[error("Movie '{id}' not found")]
    MovieNotFound { id: String },

    #[error("Invalid movie id: {0}")]
    InvalidId(String),

    #[error("Path resolves outside the library root")]
    PathOutsideRoot,

    #[error("Unauthorized")]
    Unauthorized,
}

pub type Result<T> = std::result::Result<T, FlixError>;
