//! Error handling types for tandem
//!
//! Every failure in the sync pipeline degrades to "no diagnostics for now";
//! none of these errors is meant to abort the process.

use std::sync::PoisonError;
use thiserror::Error;

/// Error type shared by the client and server halves of the sync protocol
#[derive(Debug, Error)]
pub enum SyncError {
    /// A delta addressed characters outside the mirrored content
    #[error(
        "Out of range edit on {path}: offset {offset} length {length} exceeds content length {content_length}"
    )]
    OutOfRangeEdit {
        path: String,
        offset: usize,
        length: usize,
        content_length: usize,
    },

    /// The working copy is waiting for a full-content resync
    #[error("Working copy is desynchronized: {path}")]
    Desynchronized { path: String },

    /// No working copy is tracked for the path
    #[error("Working copy not found: {path}")]
    MissingWorkingCopy { path: String },

    /// `pop` was called on an empty dirty region queue
    #[error("Dirty region queue is empty")]
    EmptyQueue,

    /// A reconciling strategy failed on one partition
    #[error("Strategy for {content_type} failed: {message}")]
    Strategy {
        content_type: String,
        message: String,
    },

    /// A message could not be handed to the transport
    #[error("Transport to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    /// The reconciliation engine failed on a working copy
    #[error("Reconciliation of {path} failed: {message}")]
    Engine { path: String, message: String },

    /// An inbound payload did not match the message contract
    #[error("Malformed {method} payload: {message}")]
    Protocol { method: String, message: String },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Helper trait to recover the guard of a poisoned std lock.
pub trait LockResultExt<T> {
    /// Take the guard even if another thread panicked while holding the lock.
    ///
    /// The context names the operation in the recovery warning.
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "tandem::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}

impl SyncError {
    pub fn desynchronized(path: impl Into<String>) -> Self {
        SyncError::Desynchronized { path: path.into() }
    }

    pub fn missing_working_copy(path: impl Into<String>) -> Self {
        SyncError::MissingWorkingCopy { path: path.into() }
    }

    pub fn strategy(content_type: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Strategy {
            content_type: content_type.into(),
            message: message.into(),
        }
    }

    pub fn transport(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Transport {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn engine(path: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Engine {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn protocol(method: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Protocol {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        SyncError::Config {
            message: message.into(),
        }
    }

    /// True when the error means the mirror no longer matches the client.
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            SyncError::OutOfRangeEdit { .. } | SyncError::Desynchronized { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn recover_poison_returns_inner_guard() {
        let lock = Arc::new(Mutex::new(5));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(lock.is_poisoned());
        let guard = lock.lock().recover_poison("test");
        assert_eq!(*guard, 5);
    }

    #[test]
    fn only_range_and_desync_errors_require_resync() {
        let out_of_range = SyncError::OutOfRangeEdit {
            path: "/p/A.java".into(),
            offset: 100,
            length: 5,
            content_length: 10,
        };
        assert!(out_of_range.requires_resync());
        assert!(SyncError::desynchronized("/p/A.java").requires_resync());
        assert!(!SyncError::EmptyQueue.requires_resync());
        assert!(!SyncError::transport("ws-agent", "closed").requires_resync());
    }
}
