use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a metadata lookup against the YouTube Data API
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("YouTube API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("YouTube API reported results for {0} but returned no items")]
    MissingItem(String),
}

/// Failure of the chat transport. Always fatal to the current session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("connection closed by server")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("nickname {nickname} still in use after {attempts} retries")]
    NicknameExhausted { nickname: String, attempts: u32 },

    #[error("server error: {0}")]
    Server(String),
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
