//! The error type shared by every channel operation.
//!
//! At the [`Channel`](crate::Channel) level any error means the channel is dead and should be
//! dropped by its owner. The variants exist so that the owner can tell an orderly peer shutdown
//! ([`Error::Closed`]) from everything else, and so that logs say what actually went wrong.

use crate::cmsg::Truncation;
use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reasons for which a send or receive did not complete.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The peer closed its end of the connection before a new message began.
    #[error("channel closed by peer")]
    Closed,
    /// The channel was already closed on this side.
    #[error("channel has already been released")]
    Released,
    /// The kernel reported that the payload, the descriptors, or both did not fit into the buffers
    /// provided. Every descriptor that did arrive has been closed.
    #[error("message truncated ({0})")]
    Truncated(Truncation),
    /// The connection ended in the middle of a framed message.
    #[error("connection ended after {received} of {expected} bytes")]
    Incomplete {
        /// Size of the framing unit (header or body) that was being read.
        expected: usize,
        /// How much of it arrived.
        received: usize,
    },
    /// The peer announced a message larger than the receive buffer.
    #[error("peer declared a {declared}-byte message, receive buffer holds {capacity} bytes")]
    Oversize {
        /// Payload length from the framing header.
        declared: usize,
        /// Length of the caller's buffer.
        capacity: usize,
    },
    /// The peer announced a message without payload.
    #[error("peer declared an empty message")]
    EmptyMessage,
    /// The peer announced more descriptors than a message can carry.
    #[error("peer declared {declared} descriptors, at most {} are allowed", crate::MAX_FD_COUNT)]
    TooManyDescriptors {
        /// Descriptor count from the framing header.
        declared: usize,
    },
    /// A message of an exact size was expected, but one of a different size arrived.
    #[error("expected a {expected}-byte message, got {received} bytes")]
    SizeMismatch {
        /// The size the caller asked for.
        expected: usize,
        /// The size that was delivered.
        received: usize,
    },
    /// A system call failed with a non-transient error.
    #[error(transparent)]
    Io(#[from] io::Error),
}
impl Error {
    /// Returns `true` if this is an orderly disconnect by the peer rather than a failure.
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        use io::ErrorKind::*;
        let kind = match e {
            Error::Io(inner) => return inner,
            Error::Closed | Error::Incomplete { .. } => UnexpectedEof,
            Error::Released => NotConnected,
            Error::Truncated(..)
            | Error::Oversize { .. }
            | Error::EmptyMessage
            | Error::TooManyDescriptors { .. }
            | Error::SizeMismatch { .. } => InvalidData,
        };
        io::Error::new(kind, e)
    }
}
