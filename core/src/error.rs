use std::{io, path::PathBuf};
use thiserror::Error;

/// Failures talking to the node.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("network error calling {method} on {url}: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("node returned HTTP {status} for {method}")]
    Status { method: String, status: u16 },

    #[error("node rejected {method}: {message} (code {code})")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("malformed response to {method}: {reason}")]
    Malformed { method: String, reason: String },
}

/// Failures while building or installing the log router.
#[derive(Debug, Error)]
pub enum LogSetupError {
    #[error("cannot open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("category '{category}' references undeclared appender '{appender}'")]
    UnknownAppender { category: String, appender: String },

    #[error("no 'default' category declared")]
    MissingDefault,

    #[error("a global logger is already installed")]
    AlreadyInstalled(#[from] log::SetLoggerError),
}
