use chrono::NaiveDate;
use extract::{AssigneeNormalizer, ClaimEntry, ExtractedRecord, RelatedApplication};
use ingest::PatentNumber;
use priority::{PriorityResolution, PrioritySource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::conflict::{FieldConflict, QualityFlag};
use crate::enrichment::{CitingAssignee, EnrichmentRecord};
use crate::error::MergeError;
use crate::expiration::ExpirationCalculator;

/// What the caller already believed about a patent before this run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorKnowledge {
    pub forward_cites: Option<u32>,
}

/// One patent with primary and enrichment data folded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRecord {
    pub identifier: PatentNumber,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub grant_date: NaiveDate,
    pub filing_date: Option<NaiveDate>,
    pub application_number: String,
    pub earliest_priority_date: NaiveDate,
    pub priority_source: PrioritySource,
    pub priority_chain: Vec<String>,
    pub base_expiration: Option<NaiveDate>,
    pub adjusted_expiration: Option<NaiveDate>,
    pub expiration: Option<NaiveDate>,
    pub assignee_original: Option<String>,
    pub assignee_current: Option<String>,
    /// Only independent claims are carried; dependents are counted.
    pub independent_claims: Vec<ClaimEntry>,
    pub claim_count: usize,
    pub related: Vec<RelatedApplication>,
    pub family_members: Vec<String>,
    pub forward_cites: Option<u32>,
    pub citing_assignees: Vec<CitingAssignee>,
    pub conflicts: Vec<FieldConflict>,
    pub quality_flags: Vec<QualityFlag>,
}

#[derive(Debug, Default)]
pub struct EnrichmentMerger {
    expiration: ExpirationCalculator,
    normalizer: AssigneeNormalizer,
}

impl EnrichmentMerger {
    pub fn new(expiration: ExpirationCalculator) -> Self {
        Self {
            expiration,
            normalizer: AssigneeNormalizer::new(),
        }
    }

    /// Fold enrichment into a parsed record. Conflicts come out in a fixed
    /// field order: forward citations, then expiration.
    pub fn merge(
        &self,
        extracted: ExtractedRecord,
        resolution: &PriorityResolution,
        enrichment: Option<&EnrichmentRecord>,
        prior: &PriorKnowledge,
    ) -> Result<ReconciledRecord, MergeError> {
        let ExtractedRecord {
            record,
            unclassified_claims,
        } = extracted;
        let id_label = record.identifier.to_string();

        if let Some(raw) = enrichment.and_then(|e| e.identifier.as_deref()) {
            let same = PatentNumber::parse(raw)
                .map(|n| n.matches(&record.identifier))
                .unwrap_or(false);
            if !same {
                return Err(MergeError::IdentifierMismatch {
                    primary: id_label,
                    secondary: raw.to_string(),
                });
            }
        }

        let mut conflicts = Vec::new();
        let mut flags = Vec::new();

        if !unclassified_claims.is_empty() {
            flags.push(QualityFlag::UnclassifiedClaims {
                claims: unclassified_claims,
            });
        }
        flags.extend(resolution.anomalies.iter().cloned().map(QualityFlag::PriorityChain));

        let enriched_cites = enrichment.and_then(|e| e.forward_cites);
        if let (Some(known), Some(incoming)) = (prior.forward_cites, enriched_cites) {
            if known != incoming {
                warn!(
                    identifier = %id_label,
                    prior = known,
                    enrichment = incoming,
                    "forward citation count changed"
                );
                conflicts.push(FieldConflict::new("forward_cites", known, incoming));
            }
        }
        let forward_cites = enriched_cites.or(prior.forward_cites);

        let assignee_current = enrichment.and_then(|e| e.assignee_current.clone());
        if let (Some(original), Some(current)) = (&record.assignee_original, &assignee_current) {
            if !self.normalizer.same_entity(original, current) {
                debug!(identifier = %id_label, original = %original, current = %current, "assignee changed");
                flags.push(QualityFlag::AssigneeChanged {
                    original: original.clone(),
                    current: current.clone(),
                });
            }
        }

        let expiration = self.expiration.evaluate(
            &id_label,
            resolution.earliest_priority_date,
            record.grant_date,
            enrichment.and_then(|e| e.adjusted_expiration),
        );
        conflicts.extend(expiration.conflicts);
        flags.extend(expiration.flags);

        let family_members = self.family_union(
            &record.identifier,
            record.family_members.iter(),
            enrichment.map(|e| e.simple_family.as_slice()).unwrap_or(&[]),
        );

        let claim_count = record.claim_count();
        let independent_claims: Vec<ClaimEntry> = record.independent_claims().cloned().collect();

        Ok(ReconciledRecord {
            application_number: record.formatted_application_number(),
            identifier: record.identifier,
            title: record.title,
            abstract_text: record.abstract_text,
            grant_date: record.grant_date,
            filing_date: record.filing_date,
            earliest_priority_date: resolution.earliest_priority_date,
            priority_source: resolution.source,
            priority_chain: resolution.chain.clone(),
            base_expiration: expiration.base,
            adjusted_expiration: expiration.adjusted,
            expiration: expiration.effective,
            assignee_original: record.assignee_original,
            assignee_current,
            independent_claims,
            claim_count,
            related: record.related,
            family_members,
            forward_cites,
            citing_assignees: enrichment
                .map(|e| e.citing_assignees.clone())
                .unwrap_or_default(),
            conflicts,
            quality_flags: flags,
        })
    }

    /// Union of both family lists in canonical form, without the record itself.
    fn family_union<'a>(
        &self,
        own: &PatentNumber,
        primary: impl Iterator<Item = &'a String>,
        secondary: &'a [String],
    ) -> Vec<String> {
        let own_key = own.key();
        let members: BTreeSet<String> = primary
            .chain(secondary.iter())
            .filter_map(|raw| match PatentNumber::parse(raw) {
                Ok(n) if n.key() == own_key => None,
                Ok(n) => Some(n.to_string()),
                Err(_) => {
                    let trimmed = raw.trim();
                    (!trimmed.is_empty()).then(|| trimmed.to_uppercase())
                }
            })
            .collect();
        members.into_iter().collect()
    }
}
