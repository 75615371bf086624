use std::fmt;

/// Failures a sink can report back through the stream.
///
/// Programming defects (writing past a reservation, draining with cursors
/// still outstanding, etc.) are not part of this type; they are asserted at
/// the point of violation instead, since they indicate a bug in the caller
/// rather than a recoverable runtime condition.
#[derive(Debug)]
pub enum Error {
    /// The underlying sink reported an I/O failure.
    Io(std::io::Error),
    /// A previous operation already failed; the stream is closed for
    /// writing and the only valid next step is to drop it.
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error in output sink: {}", e),
            Error::Closed => write!(f, "stream is closed after a previous error"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Closed => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
