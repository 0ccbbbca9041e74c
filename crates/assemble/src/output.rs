use chrono::{DateTime, NaiveDate, Utc};
use reconcile::{EnrichmentRecord, ReconciledRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error("incomplete batch: no data for {}", missing.join(", "))]
    IncompleteBatch { missing: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    MalformedRecord,
    MergeError,
    /// Names a patent an earlier target in the same batch already covers.
    DuplicateTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub identifier: String,
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentRecord>,
}

impl FailedEntry {
    pub fn new(identifier: impl Into<String>, kind: FailureKind, message: impl ToString) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            message: message.to_string(),
            enrichment: None,
        }
    }

    pub fn with_enrichment(mut self, enrichment: Option<EnrichmentRecord>) -> Self {
        self.enrichment = enrichment;
        self
    }

    /// Nothing at all is known about this identifier.
    pub fn is_uncovered(&self) -> bool {
        matches!(self.kind, FailureKind::NotFound | FailureKind::MalformedRecord)
            && self.enrichment.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatentEntry {
    Reconciled(Box<ReconciledRecord>),
    Failed(FailedEntry),
}

impl PatentEntry {
    pub fn identifier(&self) -> String {
        match self {
            Self::Reconciled(record) => record.identifier.to_string(),
            Self::Failed(failed) => failed.identifier.clone(),
        }
    }

    pub fn as_reconciled(&self) -> Option<&ReconciledRecord> {
        match self {
            Self::Reconciled(record) => Some(&**record),
            Self::Failed(_) => None,
        }
    }

    pub fn as_failed(&self) -> Option<&FailedEntry> {
        match self {
            Self::Reconciled(_) => None,
            Self::Failed(failed) => Some(failed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Current owner of the first reconciled patent, else its original one.
    pub assignee: Option<String>,
    pub record_count: usize,
    pub failed_count: usize,
    pub total_forward_cites: u64,
    pub independent_claims: usize,
    pub earliest_expiration: Option<NaiveDate>,
    pub latest_expiration: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDocument {
    pub portfolio: PortfolioSummary,
    pub patents: Vec<PatentEntry>,
}

impl PortfolioDocument {
    pub fn reconciled(&self) -> impl Iterator<Item = &ReconciledRecord> {
        self.patents.iter().filter_map(PatentEntry::as_reconciled)
    }

    pub fn failed(&self) -> impl Iterator<Item = &FailedEntry> {
        self.patents.iter().filter_map(PatentEntry::as_failed)
    }

    /// Same entries under a fresh run id and timestamp, for replaying a
    /// stored document.
    pub fn reissued(mut self) -> Self {
        self.portfolio.run_id = Uuid::new_v4();
        self.portfolio.generated_at = Utc::now();
        self
    }
}

#[derive(Debug, Default)]
pub struct OutputAssembler {
    require_complete: bool,
}

impl OutputAssembler {
    pub fn new(require_complete: bool) -> Self {
        Self { require_complete }
    }

    /// Wrap per-identifier entries, already in target order, into the
    /// portfolio document.
    pub fn assemble(&self, entries: Vec<PatentEntry>) -> Result<PortfolioDocument, AssembleError> {
        let missing: Vec<String> = entries
            .iter()
            .filter_map(PatentEntry::as_failed)
            .filter(|f| f.is_uncovered())
            .map(|f| f.identifier.clone())
            .collect();

        if !missing.is_empty() {
            if self.require_complete {
                return Err(AssembleError::IncompleteBatch { missing });
            }
            warn!(missing = ?missing, "identifiers without any data");
        }

        let reconciled: Vec<&ReconciledRecord> =
            entries.iter().filter_map(PatentEntry::as_reconciled).collect();

        let assignee = reconciled.first().and_then(|r| {
            r.assignee_current
                .clone()
                .or_else(|| r.assignee_original.clone())
        });
        let expirations = reconciled.iter().filter_map(|r| r.expiration);

        let portfolio = PortfolioSummary {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            assignee,
            record_count: reconciled.len(),
            failed_count: entries.len() - reconciled.len(),
            total_forward_cites: reconciled
                .iter()
                .filter_map(|r| r.forward_cites)
                .map(u64::from)
                .sum(),
            independent_claims: reconciled.iter().map(|r| r.independent_claims.len()).sum(),
            earliest_expiration: expirations.clone().min(),
            latest_expiration: expirations.max(),
        };

        info!(
            run_id = %portfolio.run_id,
            reconciled = portfolio.record_count,
            failed = portfolio.failed_count,
            "portfolio assembled"
        );

        Ok(PortfolioDocument {
            portfolio,
            patents: entries,
        })
    }
}
