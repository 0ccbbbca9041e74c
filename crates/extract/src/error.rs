use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed record {identifier}: missing {field}")]
    MissingField {
        identifier: String,
        field: &'static str,
    },

    #[error("malformed record {identifier}: {reason}")]
    Invalid { identifier: String, reason: String },
}

impl ParseError {
    pub fn identifier(&self) -> &str {
        match self {
            Self::MissingField { identifier, .. } | Self::Invalid { identifier, .. } => identifier,
        }
    }
}
