//! Error types for the CollectionSpace client.
//!
//! # Design
//! Every failure surfaces as one `ApiError` variant with fixed fields. The
//! five session/API kinds render with the legacy error code in parentheses
//! (`"login failed (ELOGINFAILED)"`) so log lines stay greppable by code;
//! `ApiError::kind` gives the same classification for matching.

use thiserror::Error;

/// Coarse classification of an `ApiError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or DNS failure before a response was received.
    Transport,
    LoginFailed,
    LogoutFailed,
    NotConnected,
    /// The server answered with a structured error payload.
    Api,
    /// Non-2xx status without an error payload.
    Http,
    Deserialization,
    Serialization,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Transport => "ENOTFOUND",
            ErrorKind::LoginFailed => "ELOGINFAILED",
            ErrorKind::LogoutFailed => "ELOGOUTFAILED",
            ErrorKind::NotConnected => "ENOTCONNECTED",
            ErrorKind::Api => "EAPI",
            ErrorKind::Http => "EHTTP",
            ErrorKind::Deserialization => "EPARSE",
            ErrorKind::Serialization => "ESERIALIZE",
        }
    }
}

/// Errors returned by `SessionClient` operations and `CollectionSpaceApi`
/// parse methods.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The request never produced a response (unreachable host, refused
    /// connection, TLS failure).
    #[error("{0} (ENOTFOUND)")]
    Transport(String),

    /// Credentials were rejected or the login could not be confirmed.
    #[error("login failed (ELOGINFAILED)")]
    LoginFailed,

    /// The server still reports an active session after logout.
    #[error("logout failed (ELOGOUTFAILED)")]
    LogoutFailed,

    #[error("not connected (ENOTCONNECTED)")]
    NotConnected,

    /// The server returned an `isError` payload.
    #[error("{message} (EAPI)")]
    Api {
        message: String,
        csid: Option<String>,
    },

    /// The server returned a non-2xx status without an error payload.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    #[error("serialization failed: {0}")]
    SerializationError(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport(_) => ErrorKind::Transport,
            ApiError::LoginFailed => ErrorKind::LoginFailed,
            ApiError::LogoutFailed => ErrorKind::LogoutFailed,
            ApiError::NotConnected => ErrorKind::NotConnected,
            ApiError::Api { .. } => ErrorKind::Api,
            ApiError::HttpError { .. } => ErrorKind::Http,
            ApiError::DeserializationError(_) => ErrorKind::Deserialization,
            ApiError::SerializationError(_) => ErrorKind::Serialization,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Record id attached to an `Api` error, when the server reported one.
    pub fn csid(&self) -> Option<&str> {
        match self {
            ApiError::Api { csid, .. } => csid.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}
