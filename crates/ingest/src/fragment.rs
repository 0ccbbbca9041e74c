use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::identifier::PatentNumber;

/// One document's raw markup cut out of a weekly container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocumentFragment {
    pub container: String,
    /// Identifier as declared in the fragment header (often without kind code).
    pub identifier: PatentNumber,
    pub fragment_id: String,
    pub text: String,
    pub offset: (usize, usize), // [start, end) byte positions in the container
}

impl RawDocumentFragment {
    pub fn new(
        container: String,
        identifier: PatentNumber,
        text: String,
        offset: (usize, usize),
    ) -> Self {
        let fragment_id = Self::generate_fragment_id(&container, &text, offset);

        Self {
            container,
            identifier,
            fragment_id,
            text,
            offset,
        }
    }

    fn generate_fragment_id(container: &str, text: &str, offset: (usize, usize)) -> String {
        let mut hasher = Sha256::new();
        hasher.update(container.as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(offset.0.to_string().as_bytes());
        hasher.update(offset.1.to_string().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16]) // first 16 bytes (32 hex chars)
    }

    pub fn len(&self) -> usize {
        self.offset.1 - self.offset.0
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
