//! Error types for the slotpool crate.

use core::fmt;

/// Result type alias using the slotpool error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Boxed error type produced by user-supplied [`Allocator`] implementations.
///
/// Allocation failures travel through the pool wrapped in
/// [`Error::AllocationFailed`]; deallocation failures are swallowed.
///
/// [`Allocator`]: crate::Allocator
pub type AllocError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when configuring or claiming from a pool.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration was provided when building a pool.
    InvalidConfiguration {
        /// Description of what was invalid
        message: &'static str,
    },

    /// The pool has been shut down; no further claims can succeed.
    ShutDown,

    /// The user-supplied allocator failed to construct an object.
    ///
    /// The pool remains usable; a later claim retries the allocation.
    AllocationFailed {
        /// The underlying allocator error
        source: AllocError,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration { message } => {
                write!(f, "Invalid pool configuration: {}", message)
            }
            Error::ShutDown => {
                write!(f, "Pool has been shut down")
            }
            Error::AllocationFailed { source } => {
                write!(f, "Allocator failed to construct an object: {}", source)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::AllocationFailed { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl Error {
    /// Creates a new invalid configuration error.
    #[inline]
    pub fn invalid_config(message: &'static str) -> Self {
        Error::InvalidConfiguration { message }
    }

    /// Wraps an allocator failure.
    #[inline]
    pub fn allocation_failed(source: AllocError) -> Self {
        Error::AllocationFailed { source }
    }
}
