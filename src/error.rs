//! Error types shared by the decoder and the encoder
use std::io;

use thiserror::Error;

/// Errors returned while probing, decoding or encoding a GIF stream.
///
/// Every decode error carries the byte offset at which it was detected.
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer does not start with a GIF signature.
    ///
    /// This is not a hard failure for a caller that owns several coders:
    /// it means "try another one".
    #[error("not a GIF stream")]
    UnsupportedFormat,

    /// The header or logical screen descriptor is malformed.
    #[error("corrupt header at byte {offset}: {reason}")]
    CorruptHeader { offset: usize, reason: &'static str },

    /// A block in the stream body is malformed.
    #[error("corrupt stream at byte {offset}: {reason}")]
    CorruptStream { offset: usize, reason: &'static str },

    /// The buffer ended before the trailer.
    #[error("stream truncated at byte {offset}")]
    TruncatedStream { offset: usize },

    /// An LZW code referenced an entry that is not in the dictionary yet.
    #[error("invalid LZW code in image data starting at byte {offset}")]
    InvalidLzwCode { offset: usize },

    /// Composited output would exceed the configured memory limit.
    #[error("decoding at byte {offset} needs {required} bytes, limit is {limit}")]
    MemoryLimitExceeded {
        offset: usize,
        required: u64,
        limit: u64,
    },

    /// The image or options cannot be expressed as a GIF stream.
    #[error("cannot encode: {0}")]
    EncodingConstraintViolation(String),

    /// The output sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Byte offset at which a decode error was detected.
    pub fn offset(&self) -> Option<usize> {
        match *self {
            Error::UnsupportedFormat => Some(0),
            Error::CorruptHeader { offset, .. }
            | Error::CorruptStream { offset, .. }
            | Error::TruncatedStream { offset }
            | Error::InvalidLzwCode { offset }
            | Error::MemoryLimitExceeded { offset, .. } => Some(offset),
            Error::EncodingConstraintViolation(_) | Error::Io(_) => None,
        }
    }

    /// Whether the input simply is not a GIF.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, Error::UnsupportedFormat)
    }

    pub(crate) fn constraint(msg: impl Into<String>) -> Self {
        Error::EncodingConstraintViolation(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
