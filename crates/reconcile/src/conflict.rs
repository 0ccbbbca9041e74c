use chrono::NaiveDate;
use priority::ChainAnomaly;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Two sources disagree on a field. `primary` is the value already held
/// (derived from the grant, or known beforehand), `secondary` the incoming
/// enrichment value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: String,
    pub primary: Value,
    pub secondary: Value,
}

impl FieldConflict {
    pub fn new(field: &str, primary: impl Into<Value>, secondary: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    pub fn dates(field: &str, primary: NaiveDate, secondary: NaiveDate) -> Self {
        Self::new(field, primary.to_string(), secondary.to_string())
    }
}

/// Data-quality notes that do not amount to a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flag", rename_all = "snake_case")]
pub enum QualityFlag {
    /// Independent claims that matched no category rule.
    UnclassifiedClaims { claims: Vec<u32> },
    /// Ownership moved between grant and enrichment snapshot.
    AssigneeChanged { original: String, current: String },
    /// Enrichment expiration precedes the grant and was not used.
    AdjustedExpirationBeforeGrant { adjusted: NaiveDate, grant: NaiveDate },
    /// Base expiration overflowed the calendar.
    ExpirationOutOfRange { priority: NaiveDate },
    PriorityChain(ChainAnomaly),
}
