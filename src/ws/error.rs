#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

/// WebSocket error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Error parsing a WebSocket message
    MessageParse {
        /// Path of the offending value, empty when the frame is not valid JSON
        path: String,
        source: serde_json::Error,
    },
    /// The connection task is gone; no further commands can be delivered
    ConnectionClosed,
    /// A connection or timer was requested outside of an async runtime
    NoRuntime,
    /// The resolved address cannot be used to open a connection
    InvalidAddress {
        address: String,
        reason: String,
    },
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageParse { path, source } if path.is_empty() => {
                write!(f, "Failed to parse WebSocket message: {source}")
            }
            Self::MessageParse { path, source } => {
                write!(f, "Failed to parse WebSocket message at `{path}`: {source}")
            }
            Self::ConnectionClosed => write!(f, "WebSocket connection closed"),
            Self::NoRuntime => write!(f, "no async runtime available for WebSocket connection"),
            Self::InvalidAddress { address, reason } => {
                write!(f, "invalid WebSocket address `{address}`: {reason}")
            }
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::MessageParse { source, .. } => Some(source),
            _ => None,
        }
    }
}

// Integration with main Error type
impl From<WsError> for crate::error::Error {
    fn from(e: WsError) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, e)
    }
}
