use thiserror::Error;

/// Everything a client call can fail with.
///
/// The remote API treats any status above 201 as a failure, so statuses
/// 202-399 land in [`Error::Unexpected`] rather than being folded into the
/// client/server buckets.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed client construction.
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// DNS, TLS, connection and other transport failures from the HTTP
    /// layer. Not retried here.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API rejected the request (status 400-499).
    #[error("API client error {status}: {body}")]
    Client { status: u16, body: String },

    /// The API failed on its side (status 500-599).
    #[error("API server error {status}: {body}")]
    Server { status: u16, body: String },

    /// A status above 201 that is neither a client nor a server error.
    #[error("unexpected API status {status}: {body}")]
    Unexpected { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("malformed API response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            400..=499 => Error::Client { status, body },
            500..=599 => Error::Server { status, body },
            _ => Error::Unexpected { status, body },
        }
    }

    /// The HTTP status carried by this error, when it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Client { status, .. }
            | Error::Server { status, .. }
            | Error::Unexpected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
