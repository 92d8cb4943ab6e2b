//! Channel Error Types
//!
//! Error handling for endpoint misuse, build-time rejections and shared
//! memory allocation failures.

use channel_types::{ChannelBackend, ElementType, TypeError};
use thiserror::Error;

/// Main channel error type
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Item shape differs from the channel's declared shape
    #[error("Shape mismatch on '{endpoint}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        endpoint: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Item element type differs from the channel's declared type
    #[error("Element type mismatch on '{endpoint}': expected {expected}, got {actual}")]
    TypeMismatch {
        endpoint: String,
        expected: ElementType,
        actual: ElementType,
    },

    /// Backend or specification the builder cannot serve
    #[error("Unsupported configuration for backend {backend}: {reason}")]
    Unsupported {
        backend: ChannelBackend,
        reason: String,
    },

    /// Specification failed structural validation
    #[error("Invalid channel specification: {message}")]
    InvalidSpec { message: String },

    /// Endpoint used before `start()`
    #[error("Endpoint '{endpoint}' has not been started")]
    NotStarted { endpoint: String },

    /// Endpoint used after `join()`
    #[error("Endpoint '{endpoint}' has been joined")]
    Joined { endpoint: String },

    /// The peer endpoint has been joined and no further items can flow
    #[error("Peer of endpoint '{endpoint}' has disconnected")]
    Disconnected { endpoint: String },

    /// Deadline variant of a blocking operation expired
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Shared memory segment could not be created
    #[error("Shared memory allocation of {requested} bytes failed: {message}")]
    Allocation { requested: usize, message: String },

    /// Allocator has already been torn down
    #[error("Shared memory allocator has been released")]
    AllocatorClosed,

    /// `select` called without any candidate endpoints
    #[error("Selector needs at least one endpoint")]
    NothingToSelect,

    /// Malformed data on a stream-backed channel
    #[error("Protocol error on '{endpoint}': {message}")]
    Protocol { endpoint: String, message: String },

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },

    /// Descriptor or item construction failed
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result type alias for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;

impl ChannelError {
    /// Create an unsupported configuration error
    pub fn unsupported(backend: ChannelBackend, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            backend,
            reason: reason.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub(crate) fn joined(endpoint: &str) -> Self {
        Self::Joined {
            endpoint: endpoint.to_string(),
        }
    }

    pub(crate) fn disconnected(endpoint: &str) -> Self {
        Self::Disconnected {
            endpoint: endpoint.to_string(),
        }
    }

    pub(crate) fn not_started(endpoint: &str) -> Self {
        Self::NotStarted {
            endpoint: endpoint.to_string(),
        }
    }

    /// True for errors caused by teardown rather than misuse
    pub fn is_teardown(&self) -> bool {
        matches!(self, Self::Joined { .. } | Self::Disconnected { .. })
    }
}
