//! Error types for calls that cross the boundary

use crate::Handle;
use thiserror::Error;

/// Result type for boundary calls
pub type AbiResult<T> = Result<T, NativeError>;

/// Errors raised by either runtime while servicing a boundary call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Type mismatch when converting a wire value
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type
        expected: String,
        /// Actual type
        got: String,
    },

    /// Invalid argument or malformed descriptor
    #[error("Argument error: {0}")]
    ArgumentError(String),

    /// A local function panicked while servicing the call
    #[error("Function panicked: {0}")]
    Panic(String),

    /// The other runtime reported a failure
    #[error("Remote fault: {0}")]
    Fault(String),

    /// The handle does not name any object on the receiving side
    #[error("Unknown handle: {0}")]
    UnknownHandle(Handle),

    /// The target object has no such method or property
    #[error("Unknown member '{member}' on {class_name}")]
    UnknownMember {
        /// Class of the target object
        class_name: String,
        /// Requested member name
        member: String,
    },
}

impl From<String> for NativeError {
    fn from(s: String) -> Self {
        NativeError::Fault(s)
    }
}

impl From<&str> for NativeError {
    fn from(s: &str) -> Self {
        NativeError::Fault(s.to_string())
    }
}
