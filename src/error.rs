//! Error types shared across the crate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single log reader variant.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected end of data at offset {offset} (needed {needed} bytes)")]
    Truncated { offset: usize, needed: usize },

    #[error("invalid file signature, expected {expected:?}")]
    BadSignature { expected: &'static str },

    #[error("no object signature found at offset {0}")]
    MissingObject(usize),

    #[error("object at offset {offset} has invalid size {size}")]
    BadObjectSize { offset: usize, size: u32 },

    #[error("unsupported container compression method {0}")]
    UnsupportedCompression(u16),

    #[error("container decompression failed: {0}")]
    Decompress(String),

    #[error("line {line}: {message}")]
    Line { line: usize, message: String },

    #[error("log contains no CAN frames")]
    NoFrames,
}

/// Failure to turn a log file into frames.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("log file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: no reader could decode the log (last error: {last})", path.display())]
    Unrecognized {
        path: PathBuf,
        #[source]
        last: ParseError,
    },
}

/// Failure while talking to the bench host.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },

    #[error("password environment variable {0} is not set")]
    MissingPassword(String),

    #[error("failed to prepare {}: {source}", path.display())]
    LocalPath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Top-level pipeline error.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("failed to read config {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("failed to read test definition {}: {source}", path.display())]
    Capl {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid assignment pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize run summary: {0}")]
    Summary(#[from] serde_json::Error),
}
