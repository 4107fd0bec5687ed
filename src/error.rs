use thiserror::Error;

/// Crate-wide error type surfaced by workflows.
///
/// `Validation` is raised before any remote call is attempted. `Remote`
/// aborts the current workflow step; nothing is retried and completed
/// steps are not rolled back. Malformed remote documents (`Decoding`)
/// are skipped in list contexts and mapped to `NotFound` for single
/// lookups rather than propagated.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("remote operation failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Decoding(#[from] DecodeError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid credentials")]
    InvalidCredentials,
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn remote(err: impl std::fmt::Display) -> Self {
        Error::Remote(err.to_string())
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }
}

/// Why a remote document could not be decoded into an entity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` has the wrong type")]
    WrongType(&'static str),
}
