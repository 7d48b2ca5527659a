use std::path::PathBuf;

use crate::types::EntryId;

/// Failures of the identity operations (login, register, current user).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The service rejected the email/password pair.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The bearer token was rejected.
    #[error("credential rejected by the catalog service")]
    Unauthorized,

    /// Registration was refused, with the server's reason when it gave one.
    #[error("registration failed: {}", .0.as_deref().unwrap_or("no reason given"))]
    RegistrationFailed(Option<String>),

    /// The service answered, but not in the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("network error: {0}")]
    Network(String),
}

/// Failures of the catalog operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CatalogError {
    /// The payload did not carry the expected fields.
    #[error("unexpected data format: {0}")]
    UnexpectedFormat(String),

    /// The service reported non-success for a mutation.
    #[error("{operation} rejected: {detail}")]
    Rejected {
        operation: &'static str,
        detail: String,
    },

    /// The bearer token was rejected (or missing where one is required).
    #[error("credential rejected by the catalog service")]
    Unauthorized,

    #[error("no catalog entry with id {0}")]
    NotFound(EntryId),

    #[error("network error: {0}")]
    Network(String),
}

/// Credential store I/O failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Missing or invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("no profile directory: set MOVIEAPP_PROFILE_DIR")]
    NoProfileDir,
}

/// Rejected catalog entry input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must not be blank")]
    Blank(&'static str),

    #[error(
        "year {0} is outside {min}..={max}",
        min = crate::entry::MIN_YEAR,
        max = crate::entry::MAX_YEAR
    )]
    YearOutOfRange(i32),

    #[error("an update must change at least one field")]
    EmptyPatch,
}

/// Errors that end the current session when surfaced.
///
/// [`SessionController::guard`](crate::session::SessionController::guard)
/// invalidates the session for any error reporting `true`.
pub trait RejectsCredential {
    fn rejects_credential(&self) -> bool;
}

impl RejectsCredential for AuthError {
    fn rejects_credential(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl RejectsCredential for CatalogError {
    fn rejects_credential(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::UnexpectedResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::UnexpectedFormat(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Any failure raised by this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
