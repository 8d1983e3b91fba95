//! The closed error taxonomy from spec §7, in the shape of the teacher's
//! `flux::shared::NetworkError` (a `Wait`-like transient variant alongside a
//! family of fatal ones, plus an `ErrorUtils`-style helper).

use std::fmt;
use std::io;

/// Error kinds a `netfr` API call can surface. Every public operation
/// returns `NetfrResult<T>`; there is no panicking or exception path across
/// the crate boundary.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum NetfrError {
    /// Transient resource exhaustion (context, credit, provider backpressure).
    /// The caller should retry.
    Again,
    /// The caller's buffer was too small; `required` is the size needed.
    NoSpace { required: usize },
    /// No remote region was available to satisfy a write.
    NoBuffer,
    /// The channel is not in the `Connected` state.
    NotConnected,
    /// The peer rejected or refused the connection attempt.
    ConnRefused,
    /// The peer shut down mid-session.
    ConnReset,
    /// Magic/version/type/length validation failed on an inbound message.
    BadMessage { reason: &'static str },
    /// Allocation failed, registration failed, or a CQ error other than
    /// cancellation occurred. Unrecoverable; the caller must tear down.
    Fatal(FatalKind),
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum FatalKind {
    Allocation,
    Registration,
    CompletionQueue,
    Io(io::ErrorKind),
    AddrParse,
}

pub type NetfrResult<T> = Result<T, NetfrError>;

impl NetfrError {
    /// Mirrors the teacher's `ErrorUtils::has_failed`: `true` for anything
    /// that is not a transient, retry-worthy condition.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NetfrError::Again)
    }
}

impl fmt::Display for NetfrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetfrError::Again => write!(f, "operation would block, retry"),
            NetfrError::NoSpace { required } => write!(f, "buffer too small, need {} bytes", required),
            NetfrError::NoBuffer => write!(f, "no suitable remote region for write"),
            NetfrError::NotConnected => write!(f, "channel is not connected"),
            NetfrError::ConnRefused => write!(f, "peer refused or rejected the connection"),
            NetfrError::ConnReset => write!(f, "peer shut down mid-session"),
            NetfrError::BadMessage { reason } => write!(f, "malformed message: {}", reason),
            NetfrError::Fatal(kind) => write!(f, "fatal error: {:?}", kind),
        }
    }
}

impl std::error::Error for NetfrError {}

impl From<io::Error> for NetfrError {
    #[inline]
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => NetfrError::Again,
            io::ErrorKind::ConnectionReset | io::ErrorKind::UnexpectedEof => NetfrError::ConnReset,
            io::ErrorKind::ConnectionRefused => NetfrError::ConnRefused,
            kind => NetfrError::Fatal(FatalKind::Io(kind)),
        }
    }
}

impl From<std::net::AddrParseError> for NetfrError {
    #[inline]
    fn from(_: std::net::AddrParseError) -> Self {
        NetfrError::Fatal(FatalKind::AddrParse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn again_is_recoverable() {
        assert!(NetfrError::Again.is_recoverable());
        assert!(!NetfrError::NoBuffer.is_recoverable());
        assert!(!NetfrError::Fatal(FatalKind::Allocation).is_recoverable());
    }

    #[test]
    fn would_block_maps_to_again() {
        let err: NetfrError = io::Error::from(io::ErrorKind::WouldBlock).into();
        assert_eq!(err, NetfrError::Again);
    }

    #[test]
    fn reset_maps_to_connreset() {
        let err: NetfrError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert_eq!(err, NetfrError::ConnReset);
    }
}
