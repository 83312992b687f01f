//! Typed error hierarchy for the UTIM stack.
//!
//! Mirrors the five-class error taxonomy of the design: configuration and
//! connection errors are fatal and propagate out of `connect`; framing and
//! protocol errors are logged and absorbed locally; resource errors are
//! retried or surfaced as a typed error to the caller, never as a string.

use thiserror::Error;

/// Top-level error type for the UTIM crate.
#[derive(Debug, Error)]
pub enum UtimError {
    /// Missing keys, missing master key, invalid hex. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Broker unreachable, authentication failure, channel closed.
    #[error("connection error on {endpoint}: {message}")]
    Connection {
        endpoint: &'static str,
        message: String,
    },

    /// Under-length or length-mismatched TLV. Always recovered locally;
    /// constructed only to carry context into a log call.
    #[error("framing error at {layer}: {message}")]
    Framing {
        layer: &'static str,
        message: String,
    },

    /// Out-of-sequence SRP step, unknown command tag, SRP safety-check
    /// violation, or crypto verification failure. Finalizes the frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Queue full or a wrong-type argument handed to `send`.
    #[error("resource error: {0}")]
    Resource(String),
}

/// Configuration-loading failures, see [`crate::config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_ini::de::Error,
    },

    #[error("UTIM_MASTER_KEY environment variable is not set")]
    MissingMasterKey,

    #[error("UTIM_MASTER_KEY is not valid hex: {0}")]
    InvalidMasterKeyHex(#[from] hex::FromHexError),

    #[error("unknown messaging_protocol '{0}', expected mqtt, amqp, or umqtt")]
    UnknownMessagingProtocol(String),
}

pub type Result<T> = std::result::Result<T, UtimError>;
