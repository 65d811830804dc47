// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid argument: {0}")]
    InvalidArgs(String),

    #[error("Stream already bound: {0}")]
    AlreadyBound(String),

    #[error("Bad state: {0}")]
    BadState(String),

    #[error("Buffer allocation failed: {0}")]
    Allocation(String),

    #[error("Firmware load failed: {0}")]
    Firmware(String),

    #[error("Hardware operation failed: {0}")]
    Hardware(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Pipeline is shutting down")]
    ShuttingDown,

    #[error("Peer closed")]
    PeerClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Faults in the static product configuration.
///
/// These describe a device that cannot work at all. Validation returns them;
/// the graph manager treats them as fatal when it meets one at runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("stream type {stream_type} matches {matches} nodes under {parent}")]
    AmbiguousStreamType {
        stream_type: String,
        parent: String,
        matches: usize,
    },

    #[error("stream type {stream_type} has no matching node under {parent}")]
    MissingStreamType { stream_type: String, parent: String },

    #[error("config tree exhausted at {path} without reaching an output node")]
    NoOutputNode { path: String },

    #[error("{external} external configs but {internal} internal configs")]
    MisalignedConfigs { external: usize, internal: usize },

    #[error("malformed node at {path}: {reason}")]
    MalformedNode { path: String, reason: String },
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}
