//! Error taxonomy for RPC operations.

use std::fmt;
use std::io;

use crate::CallId;

/// Errors surfaced to the controller from a call or sequence operation.
#[derive(Debug)]
pub enum RpcError {
    /// The call referenced a name absent from the method registry.
    /// Displays as the wire message `NO_SUCH_METHOD`.
    NoSuchMethod,
    /// The invoked callable raised; carries the stringified error verbatim.
    Method(String),
    /// A response arrived whose id has no pending call. This indicates
    /// channel or counter corruption and is fatal: the demux loop stops.
    UnmatchedResponse(CallId),
    /// The channel was torn down with this call outstanding.
    ChannelClosed,
    /// Controller-initiated `throw` on a sequence proxy. Always raised
    /// locally, regardless of the remote acknowledgment.
    Injected(String),
    /// The transport failed to carry a frame.
    Transport(io::Error),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::NoSuchMethod => write!(f, "NO_SUCH_METHOD"),
            RpcError::Method(msg) => write!(f, "{msg}"),
            RpcError::UnmatchedResponse(id) => {
                write!(f, "unmatched response for unknown call {id}")
            }
            RpcError::ChannelClosed => write!(f, "channel closed"),
            RpcError::Injected(msg) => write!(f, "injected: {msg}"),
            RpcError::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RpcError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RpcError {
    fn from(e: io::Error) -> Self {
        RpcError::Transport(e)
    }
}

impl RpcError {
    /// Reconstruct the error kind from a wire error string.
    ///
    /// `NO_SUCH_METHOD` is the one message with a reserved meaning; every
    /// other string is a stringified failure from the invoked callable.
    pub fn from_wire(message: String) -> Self {
        if message == "NO_SUCH_METHOD" {
            RpcError::NoSuchMethod
        } else {
            RpcError::Method(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_such_method_displays_wire_message() {
        assert_eq!(RpcError::NoSuchMethod.to_string(), "NO_SUCH_METHOD");
    }

    #[test]
    fn from_wire_distinguishes_no_such_method() {
        assert!(matches!(
            RpcError::from_wire("NO_SUCH_METHOD".into()),
            RpcError::NoSuchMethod
        ));
        assert!(matches!(
            RpcError::from_wire("kaboom".into()),
            RpcError::Method(m) if m == "kaboom"
        ));
    }
}
