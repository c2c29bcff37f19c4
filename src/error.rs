use std::path::PathBuf;

/// Errors that can occur in the alignment output stage.
///
/// Every variant is fatal for the run: the caller stops processing reads and
/// reports the message. Nothing here is retried per read.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    Parameter(String),

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    /// An internal invariant was violated; the record in progress is discarded.
    #[error("EXITING because of a BUG: {0}")]
    Bug(String),

    #[error("invalid read: {0}")]
    Read(String),
}

impl Error {
    /// Convenience for wrapping an `io::Error` with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            path: PathBuf::from("<unknown>"),
        }
    }
}
