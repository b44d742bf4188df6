use std::{fmt, io};

/// Fatal session failures. Datagrams carrying a foreign transaction id are
/// not errors: they are dropped without touching the session.
#[derive(Debug)]
pub enum Error {
    /// Malformed wire response. Never retried.
    Parse(String),
    /// The tracker answered with its error action, or a response's action
    /// does not match the phase that sent the request.
    Protocol(String),
    /// Resolution, send or receive failed at the transport level.
    Network(io::Error),
    /// The retry budget ran out without a matching response.
    Timeout,
    /// The session was shut down before it settled.
    Aborted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(message) => write!(f, "malformed tracker response: {message}"),
            Error::Protocol(message) => write!(f, "tracker protocol violation: {message}"),
            Error::Network(source) => write!(f, "tracker unreachable: {source}"),
            Error::Timeout => write!(f, "tracker did not answer within the retry budget"),
            Error::Aborted => write!(f, "session aborted"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Network(source) => Some(source),
            _ => None,
        }
    }
}
