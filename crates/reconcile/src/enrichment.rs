use chrono::NaiveDate;
use ingest::PatentNumber;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Citing assignees kept per record.
pub const MAX_CITING_ASSIGNEES: usize = 7;

/// Names this short are initials or noise, not owners.
const MIN_ASSIGNEE_NAME_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitingAssignee {
    pub name: String,
    pub count: u32,
}

/// Citation and ownership data from a second source. Every field may be
/// missing; missing stays missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentRecord {
    pub identifier: Option<String>,
    pub forward_cites: Option<u32>,
    pub citing_assignees: Vec<CitingAssignee>,
    pub simple_family: Vec<String>,
    pub assignee_current: Option<String>,
    pub adjusted_expiration: Option<NaiveDate>,
}

impl EnrichmentRecord {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            ..Self::default()
        }
    }

    /// Tally raw citing-assignee names, one entry per citing patent.
    /// Most frequent first; ties keep the order names were first seen.
    pub fn with_citing_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tally: Vec<CitingAssignee> = Vec::new();
        for raw in names {
            let name = raw.as_ref().trim().to_uppercase();
            if name.chars().count() < MIN_ASSIGNEE_NAME_LEN {
                continue;
            }
            match tally.iter_mut().find(|c| c.name == name) {
                Some(entry) => entry.count += 1,
                None => tally.push(CitingAssignee { name, count: 1 }),
            }
        }

        // stable: ties stay in first-seen order
        tally.sort_by(|a, b| b.count.cmp(&a.count));
        tally.truncate(MAX_CITING_ASSIGNEES);
        self.citing_assignees = tally;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.forward_cites.is_none()
            && self.citing_assignees.is_empty()
            && self.simple_family.is_empty()
            && self.assignee_current.is_none()
            && self.adjusted_expiration.is_none()
    }
}

/// Enrichment records looked up by publication number, whatever
/// formatting the source used for its keys.
#[derive(Debug, Default, Clone)]
pub struct EnrichmentIndex {
    records: HashMap<String, EnrichmentRecord>,
}

impl EnrichmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(raw: HashMap<String, EnrichmentRecord>) -> Self {
        let mut entries: Vec<(String, EnrichmentRecord)> = raw.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut index = Self::new();
        for (key, record) in entries {
            index.insert(&key, record);
        }
        index
    }

    /// Returns false when the key is not a publication number.
    pub fn insert(&mut self, key: &str, record: EnrichmentRecord) -> bool {
        match PatentNumber::parse(key) {
            Ok(number) => {
                self.records.insert(number.key(), record);
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "enrichment key skipped");
                false
            }
        }
    }

    pub fn get(&self, identifier: &PatentNumber) -> Option<&EnrichmentRecord> {
        self.records.get(&identifier.key())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
