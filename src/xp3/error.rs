#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Xp3Error {
    #[error("cannot create output {path}: {source}")]
    OutputCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read source file {path}: {source}")]
    SourceReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write to archive failed: {0}")]
    SourceWriteFailed(#[source] std::io::Error),

    #[error("index serialization failed: {0}")]
    IndexSerializationFailed(String),

    #[error("path is outside input dir: {0}")]
    Outside(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid xp3: {0}")]
    Invalid(String),
}

pub type Xp3Result<T> = Result<T, Xp3Error>;
