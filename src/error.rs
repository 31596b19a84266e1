// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{io, result, sync::Arc};

use reqwest::StatusCode;
use thiserror::Error;

pub(crate) type Result<T, E = Error> = result::Result<T, E>;

/// The broad kind of a failure, as the caller should react to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ErrorClass {
    /// The credential is missing, expired, or rejected. The session must be
    /// cleared.
    Auth,
    /// The backend rejected the request itself. Shown verbatim, never retried.
    Validation,
    /// The backend failed while handling a well-formed request.
    Server,
    /// No response was received at all.
    Network,
    /// Something went wrong on this side of the wire.
    Local,
}

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),
    #[error("JSON format error: {0}")]
    Json(serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("API error: {0}")]
    Api(#[from] Api),
    #[error("could not reach the server: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("storage error: {0}")]
    Storage(#[from] Storage),
    #[error("password retrieval error: {0}")]
    Password(#[from] Password),
    #[error("internal error: {0}")]
    Internal(#[from] Internal),
    #[error(transparent)]
    Shared(Arc<Error>),
    #[error("not signed in (run the login command first)")]
    SignedOut,
    #[error("command execution failed")]
    Command,
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn class(&self) -> ErrorClass {
        match *self {
            Self::Api(ref e) => e.class(),
            Self::Network(_) => ErrorClass::Network,
            Self::Shared(ref e) => e.class(),
            Self::SignedOut => ErrorClass::Auth,
            Self::Io(_)
            | Self::Json(_)
            | Self::Url(_)
            | Self::Storage(_)
            | Self::Password(_)
            | Self::Internal(_)
            | Self::Command
            | Self::Cancelled => ErrorClass::Local,
        }
    }

    /// Reads are retried automatically only when nothing came back from the
    /// server. Writes are never retried.
    pub(crate) fn is_retryable_read(&self) -> bool {
        self.class() == ErrorClass::Network
    }
}

impl From<Arc<Error>> for Error {
    fn from(value: Arc<Error>) -> Self {
        Self::Shared(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        // LINT: Deliberate fall-through that should catch future cases added to
        // the enum.
        #[allow(clippy::wildcard_enum_match_arm)]
        match value.classify() {
            serde_json::error::Category::Io => Self::Io(value.into()),
            _ => Self::Json(value),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::Network(Box::new(value))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Io(value.into())
    }
}

impl From<pinentry::Error> for Error {
    fn from(value: pinentry::Error) -> Self {
        // LINT: Deliberate fall-through that should catch future cases added to
        // the enum.
        #[allow(
            clippy::wildcard_enum_match_arm,
            clippy::match_wildcard_for_single_variants
        )]
        match value {
            pinentry::Error::Cancelled | pinentry::Error::Timeout => Self::Cancelled,
            pinentry::Error::Io(e) => Self::Io(e),
            _ => Self::Password(Password::Pinentry(value)),
        }
    }
}

/// A non-success response from the backend, normalized.
#[derive(Error, Debug)]
pub(crate) enum Api {
    #[error("not authorized ({status}): {message}")]
    Auth { status: StatusCode, message: String },
    #[error("request rejected ({status}): {message}")]
    Validation { status: StatusCode, message: String },
    #[error("server error ({status}): {message}")]
    Server { status: StatusCode, message: String },
    #[error("response from {path} did not have the expected shape: {source}")]
    UnexpectedShape {
        path: String,
        source: serde_json::Error,
    },
}

impl Api {
    pub(crate) fn from_status(status: StatusCode, message: String) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            Self::Auth { status, message }
        } else if status.is_client_error() {
            Self::Validation { status, message }
        } else {
            Self::Server { status, message }
        }
    }

    pub(crate) const fn class(&self) -> ErrorClass {
        match *self {
            Self::Auth { .. } => ErrorClass::Auth,
            Self::Validation { .. } => ErrorClass::Validation,
            Self::Server { .. } | Self::UnexpectedShape { .. } => ErrorClass::Server,
        }
    }
}

#[derive(Error, Debug)]
pub(crate) enum Storage {
    #[error("could not determine a data directory for this user")]
    NoProjectDirs,
    #[cfg(feature = "secret-service")]
    #[error("secret service error: {0}")]
    SecretService(#[from] oo7::Error),
    #[cfg(feature = "keychain")]
    #[error("keychain error: {0}")]
    Keychain(#[from] security_framework::base::Error),
}

#[derive(Error, Debug)]
pub(crate) enum Password {
    #[error("no password prompt available")]
    NoPrompt,
    #[error("Pinentry implementation error: {0}")]
    Pinentry(pinentry::Error),
}

#[derive(Error, Debug)]
pub(crate) enum Internal {
    #[error("cached value for {0} has an unexpected type")]
    CacheType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_classes() {
        let class = |code: u16| {
            Api::from_status(
                StatusCode::from_u16(code).expect("valid status"),
                String::new(),
            )
            .class()
        };

        assert_eq!(class(401), ErrorClass::Auth);
        assert_eq!(class(400), ErrorClass::Validation);
        assert_eq!(class(404), ErrorClass::Validation);
        assert_eq!(class(422), ErrorClass::Validation);
        assert_eq!(class(500), ErrorClass::Server);
        assert_eq!(class(503), ErrorClass::Server);
    }

    #[test]
    fn shared_errors_keep_their_class() {
        let inner = Arc::new(Error::Network(Box::new(io::Error::from(
            io::ErrorKind::ConnectionRefused,
        ))));
        let err = Error::from(inner);

        assert_eq!(err.class(), ErrorClass::Network);
        assert!(err.is_retryable_read());
    }

    #[test]
    fn only_network_failures_are_retryable() {
        let err: Error = Api::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_owned()).into();
        assert!(!err.is_retryable_read());
        assert!(!Error::SignedOut.is_retryable_read());
    }
}
