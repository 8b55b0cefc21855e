use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    /// Input file does not exist. Fatal before any processing starts.
    #[error("input file not found: {}", path.display())]
    NotFound { path: PathBuf },
    /// No row carried every header marker.
    #[error("{}: no header row containing {}", path.display(), markers.join(", "))]
    HeaderNotFound { path: PathBuf, markers: Vec<String> },
    #[error("{}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: malformed CSV: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("cannot write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}
