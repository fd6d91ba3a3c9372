//! Error Classifier
//!
//! Maps raw query-engine error text onto a small set of failure kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure kind attached to failed queries and interrupted steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Schema,
    Syntax,
    Auth,
    Timeout,
    Unknown,
    /// Only used for steps stopped by the caller; never produced by `classify_error`.
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Schema => "schema",
            ErrorKind::Syntax => "syntax",
            ErrorKind::Auth => "auth",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an error message. Checks run in order and the first match wins.
pub fn classify_error(message: &str) -> ErrorKind {
    let msg = message.to_lowercase();

    if msg.contains("column") && msg.contains("does not exist") {
        ErrorKind::Schema
    } else if msg.contains("syntax") {
        ErrorKind::Syntax
    } else if msg.contains("authentication") || msg.contains("access") {
        ErrorKind::Auth
    } else if msg.contains("timeout") {
        ErrorKind::Timeout
    } else {
        ErrorKind::Unknown
    }
}
