use std::path::PathBuf;

/// Errors produced by the parameter distribution pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DistError {
    /// A precondition on the caller's input was violated. The message names
    /// the expected and the actual value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
}

pub type Result<T> = std::result::Result<T, DistError>;

/// Shorthand for `Err(DistError::InvalidInput(..))` with `format!` arguments.
macro_rules! invalid {
    ($($arg:tt)*) => {
        Err($crate::error::DistError::InvalidInput(format!($($arg)*)))
    };
}

pub(crate) use invalid;
