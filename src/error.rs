use std::{io, path::PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading or analyzing microstates.
///
/// Load failures are fatal: no partially built store or registry is ever returned.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Stream(#[from] io::Error),

    #[error("invalid microstate file format: {0}")]
    Format(String),

    #[error("parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("inconsistent conformer data: {0}")]
    Consistency(String),

    #[error("microstate store is empty")]
    EmptyStore,

    #[error("input collection is empty")]
    EmptyInput,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("conformer table is not loaded")]
    MissingRegistry,

    #[error("conformer {0} is not in the conformer table")]
    UnknownConformer(usize),
}
