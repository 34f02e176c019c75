use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited, or the quota is used up.
    RateLimitExceeded,
    /// The credentials were rejected by the provider.
    Authentication,
    /// The provider could not be reached.
    Network,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "moderated"),
            ErrorKind::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ErrorKind::Authentication => write!(f, "authentication failed"),
            ErrorKind::Network => write!(f, "network error"),
            ErrorKind::Other => write!(f, "other error"),
        }
    }
}
