//! Bridge error types.

use handlebridge_sdk::{Handle, NativeError};

/// Result alias used throughout the bridge
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by the local side of the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// No free handle was found within the attempt bound
    #[error("Handle allocation exhausted after {attempts} attempts")]
    AllocationExhausted {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// The foreign runtime failed a call
    #[error("Native call '{operation}' on {handle} failed: {source}")]
    NativeCallFault {
        /// Target of the call
        handle: Handle,
        /// Operation name (method, property or primitive)
        operation: String,
        /// Error reported by the foreign runtime
        #[source]
        source: NativeError,
    },

    /// A local delegate or exported object failed while serving a remote call
    #[error("Local call '{operation}' on {handle} failed: {source}")]
    CallbackFault {
        /// Handle the remote side called through
        handle: Handle,
        /// Operation name
        operation: String,
        /// Error raised by local code
        #[source]
        source: NativeError,
    },

    /// The handle is already bound to a different live object
    #[error("Handle {handle} is already bound to another object")]
    HandleConflict {
        /// Contested handle
        handle: Handle,
    },

    /// Handle 0 cannot be bound
    #[error("Handle 0 is reserved")]
    ReservedHandle,

    /// The handle does not (or no longer) name a live object
    #[error("Stale handle {0}")]
    StaleHandle(Handle),

    /// The handle names an object that does not serve remote calls
    #[error("Handle {0} does not name an exported object")]
    NotExported(Handle),

    /// The value kind cannot be tracked by handle
    #[error("Value of type {0} cannot carry a handle")]
    NotTrackable(&'static str),

    /// Nested arrays exceeded the marshalling depth limit
    #[error("Maximum marshalling depth exceeded")]
    MaxDepthExceeded,

    /// The context has been shut down
    #[error("Bridge context has been shut down")]
    ShutDown,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The background sweeper thread could not be started
    #[error("Failed to start sweeper: {0}")]
    Sweeper(#[from] std::io::Error),
}

impl BridgeError {
    /// Wrap a foreign runtime error with call context
    pub(crate) fn native(handle: Handle, operation: &str, source: NativeError) -> Self {
        BridgeError::NativeCallFault {
            handle,
            operation: operation.to_string(),
            source,
        }
    }

    /// Wrap a local delegate/export error with call context
    pub(crate) fn callback(handle: Handle, operation: &str, source: NativeError) -> Self {
        BridgeError::CallbackFault {
            handle,
            operation: operation.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_fault_display() {
        let err = BridgeError::native(
            Handle::from_raw(5),
            "getName",
            NativeError::Fault("boom".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Native call 'getName' on #5 failed: Remote fault: boom"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_exhaustion_display() {
        let err = BridgeError::AllocationExhausted { attempts: 100 };
        assert_eq!(err.to_string(), "Handle allocation exhausted after 100 attempts");
    }
}
