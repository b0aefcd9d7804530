//! Errors from loading, saving and versioning the configuration.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read terra.ron: {0}")]
    ReadError(#[source] io::Error),

    #[error("cannot write terra.ron: {0}")]
    WriteError(#[source] io::Error),

    #[error("terra.ron is not valid RON: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    #[error("cannot encode configuration: {0}")]
    SerializeError(#[source] ron::Error),

    /// The snapshot was already rolled back or never taken.
    #[error("no configuration snapshot {0}")]
    UnknownSnapshot(u64),
}
