use std::fmt::{self, Display};

/// The kind of error that occurred while generating a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend could not be reached, or the connection broke while
    /// streaming.
    Transport,
    /// The backend refused the request (bad credential, bad input, etc.).
    Rejected,
    /// The backend answered with a payload that cannot be understood.
    MalformedResponse,
    /// The request was cancelled by the caller.
    Cancelled,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "Transport failure"),
            ErrorKind::Rejected => write!(f, "Rejected by backend"),
            ErrorKind::MalformedResponse => write!(f, "Malformed response"),
            ErrorKind::Cancelled => write!(f, "Cancelled"),
        }
    }
}
