//! Error types for MDF4 decoding.
//!
//! This module defines the [`Error`] enum which represents all possible failures
//! that can occur when opening an MDF file, resolving its block graph or
//! sampling channel data.
//!
//! Failures fall into three classes:
//!
//! - [`Error::CorruptFormat`]: the file itself is broken (unknown block tag,
//!   impossible length or offset, misaligned record layout). Always fatal.
//! - [`Error::UnsupportedFeature`]: the file is valid but uses something this
//!   decoder does not cover. Depending on [`crate::UnsupportedPolicy`] this is
//!   either raised or degraded per channel.
//! - [`Error::UnexpectedExecutionPath`]: an internal invariant broke. This is a
//!   decoder defect, never a property of the input.
//!
//! # Example
//!
//! ```no_run
//! use mdf4_decode::{Error, Mdf4File, Result};
//!
//! fn open(path: &str) -> Result<()> {
//!     match Mdf4File::open(path) {
//!         Ok(file) => {
//!             println!("Loaded {} channel groups", file.channel_groups().len());
//!             Ok(())
//!         }
//!         Err(Error::CorruptFormat { offset, reason }) => {
//!             eprintln!("Broken file at {offset:#x}: {reason}");
//!             Err(Error::CorruptFormat { offset, reason })
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use core::fmt;

/// Errors that can occur while decoding MDF files.
#[derive(Debug)]
pub enum Error {
    /// Buffer provided for parsing was too small.
    ///
    /// This typically indicates file corruption or a truncated file.
    TooShortBuffer {
        /// Actual number of bytes available
        actual: usize,
        /// Minimum number of bytes required
        expected: usize,
        /// Source file where the error was detected
        file: &'static str,
        /// Line number where the error was detected
        line: u32,
    },

    /// The file identifier is neither "MDF     " nor "UnFinMF ".
    FileIdentifierError(String),

    /// The MDF version is not supported (requires 4.0 or later).
    FileVersioningError(String),

    /// A link pointed at a block of an unexpected kind.
    BlockIDError {
        /// The identifier that was found
        actual: String,
        /// The identifier that was expected
        expected: String,
    },

    /// An I/O error occurred while opening or mapping the file.
    IOError(std::io::Error),

    /// The block graph or record layout is structurally broken.
    CorruptFormat {
        /// File offset of the offending block (0 when not tied to a block)
        offset: u64,
        /// What was wrong
        reason: String,
    },

    /// A recognised but unimplemented feature (conversion kind, element type,
    /// variable-length records, ...).
    UnsupportedFeature(String),

    /// An internal invariant of the decoder was violated.
    UnexpectedExecutionPath(String),

    /// The caller passed arguments that cannot be served, e.g. channels of
    /// different groups to a single-group sampler.
    InvalidArgument(String),

    /// A report could not be serialized.
    #[cfg(feature = "serde")]
    Serialization(serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::CorruptFormat`].
    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Error::CorruptFormat {
            offset,
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`Error::CorruptFormat`] and truncated buffers.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Error::CorruptFormat { .. } | Error::TooShortBuffer { .. } | Error::BlockIDError { .. }
        )
    }

    /// Returns `true` for [`Error::UnsupportedFeature`].
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedFeature(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TooShortBuffer {
                actual,
                expected,
                file,
                line,
            } => write!(
                f,
                "Buffer too small at {file}:{line}: need at least {expected} bytes, got {actual}"
            ),
            Error::FileIdentifierError(id) => {
                write!(
                    f,
                    r#"Invalid file identifier: Expected "MDF     ", found {id}"#
                )
            }
            Error::FileVersioningError(ver) => {
                write!(f, r#"File version too low: Expected ">= 4.00", found {ver}"#)
            }
            Error::BlockIDError { actual, expected } => {
                write!(
                    f,
                    "Invalid block identifier: Expected {expected:?}, got {actual:?}"
                )
            }
            Error::IOError(e) => write!(f, "I/O error: {e}"),
            Error::CorruptFormat { offset, reason } => {
                write!(f, "Corrupt file at block {offset:#x}: {reason}")
            }
            Error::UnsupportedFeature(feature) => write!(f, "Unsupported feature: {feature}"),
            Error::UnexpectedExecutionPath(what) => {
                write!(f, "Decoder invariant violated: {what}")
            }
            Error::InvalidArgument(what) => write!(f, "Invalid argument: {what}"),
            #[cfg(feature = "serde")]
            Error::Serialization(e) => write!(f, "Serialization error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IOError(e) => Some(e),
            #[cfg(feature = "serde")]
            Error::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IOError(err)
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err)
    }
}

/// A specialized Result type for MDF operations.
///
/// This is defined as `core::result::Result<T, Error>` for convenience.
pub type Result<T> = core::result::Result<T, Error>;
