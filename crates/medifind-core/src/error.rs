//! Error types for the core library
//!
//! Every failure here is recoverable: the UI turns each one into a notice or
//! a disabled control and keeps running.

use thiserror::Error;

/// Failure of the outbound call itself (before any body is decoded)
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout and friends
    #[error("network error: {0}")]
    Network(reqwest::Error),

    /// The endpoint answered with a non-2xx status
    #[error("Gemini API error {status}: {body}")]
    Status { status: u16, body: String },

    /// No API key was configured for the client
    #[error("Gemini API key not configured")]
    MissingApiKey,
}

impl From<reqwest::Error> for TransportError {
    /// The request URL is dropped so nothing derived from it reaches logs
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network(err.without_url())
    }
}

/// Reasons a send can be refused or a reply rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("nothing to send: type a message or attach an image")]
    EmptyInput,

    #[error("a request is already in progress")]
    RequestInFlight,

    #[error("reply for unknown request #{0}")]
    UnknownRequest(u64),
}

/// Speech adapter control errors (recognition failures travel as events)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    #[error("speech recognition is not available")]
    Unsupported,

    #[error("already listening")]
    AlreadyListening,
}

/// Image capture errors
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("could not read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
