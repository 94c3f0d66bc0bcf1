use core::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Encode,
    Decode,
    Transport,
    Closed,
    Rejected,
    Abandoned,
    Unsupported,
    Panicked,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Encode => write!(f, "Encode failed"),
            ErrorKind::Decode => write!(f, "Decode failed"),
            ErrorKind::Transport => write!(f, "Transport write failed"),
            ErrorKind::Closed => write!(f, "Channel closed"),
            ErrorKind::Rejected => write!(f, "Task rejected by dispatcher"),
            ErrorKind::Abandoned => write!(f, "Completion dropped before resolution"),
            ErrorKind::Unsupported => write!(f, "Unsupported payload"),
            ErrorKind::Panicked => write!(f, "Task panicked"),
            ErrorKind::Io => write!(f, "I/O error"),
        }
    }
}

/// Error shared by every write promise and inbound subscriber.
///
/// Cheap to clone: one failure may be observed by many waiters.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Arc<str>,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: Arc::from(message.into()),
            source: None,
        }
    }

    pub fn with_source<E>(kind: ErrorKind, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error {
            kind,
            message: Arc::from(source.to_string()),
            source: Some(Arc::new(source)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encode, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    pub fn closed() -> Self {
        Self::new(ErrorKind::Closed, "channel is closed")
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io, err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
