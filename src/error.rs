use std::{error, fmt, io};

/// Error type for `kv_bridge`
#[derive(Debug)]
pub enum Error {
    /// std::io::Error
    Io(io::Error),
    /// serde_json::Error
    Json(serde_json::Error),
    /// No `addr` parameter, or a blank one
    MissingAddr,
    /// No `key` parameter for an action that needs one
    MissingKey,
    /// Action name outside the supported set
    InvalidAction(String),
    /// A numeric parameter that is not a non-negative integer
    InvalidNumber {
        /// parameter name
        name: &'static str,
        /// offending text
        value: String,
    },
    /// Malformed reply from the store
    Protocol(String),
    /// Error reply sent by the store
    Store(String),
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(value)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{}", e),
            Self::Json(e) => write!(f, "{}", e),
            Self::MissingAddr => write!(f, "addr is required"),
            Self::MissingKey => write!(f, "key is required"),
            Self::InvalidAction(_) => write!(f, "invalid action"),
            Self::InvalidNumber { name, value } => {
                write!(f, "{name} must be a non-negative integer, got `{value}`")
            }
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Store(msg) => write!(f, "{msg}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}
