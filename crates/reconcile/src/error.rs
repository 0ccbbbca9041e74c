use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("enrichment for {secondary} cannot be merged into {primary}")]
    IdentifierMismatch { primary: String, secondary: String },
}
