use extract::{application_key, PatentRecord};
use std::collections::HashMap;
use tracing::warn;

/// Where the resolver looks up parents that were parsed in the same batch.
pub trait ParentLookup {
    /// `application` is a bare digit key, see [`application_key`].
    fn lookup(&self, application: &str) -> Option<&PatentRecord>;
}

/// Records parsed in the current batch, keyed by application number.
/// Built once after parsing and never mutated while resolution runs.
#[derive(Debug, Default)]
pub struct WorkingSet {
    records: HashMap<String, PatentRecord>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = PatentRecord>,
    {
        let mut records_by_app = HashMap::new();
        for record in records {
            let key = application_key(&record.application_number);
            if key.is_empty() {
                continue;
            }
            if records_by_app.contains_key(&key) {
                warn!(
                    application = %key,
                    identifier = %record.identifier,
                    "application already in working set, keeping first record"
                );
                continue;
            }
            records_by_app.insert(key, record);
        }
        Self {
            records: records_by_app,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ParentLookup for WorkingSet {
    fn lookup(&self, application: &str) -> Option<&PatentRecord> {
        self.records.get(&application_key(application))
    }
}
