use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("{identifier} not found in {searched} container(s)")]
    NotFound { identifier: String, searched: usize },

    #[error("unrecognised patent number: {0:?}")]
    InvalidIdentifier(String),

    #[error("unknown container: {0}")]
    UnknownContainer(String),
}
